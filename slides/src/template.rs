/// Marker the rendered slides are substituted for.
pub const DEFAULT_PLACEHOLDER: &str = "<!-- SLIDES -->";

/// A page skeleton with a placeholder for the slides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    skeleton: String,
    placeholder: String,
}

impl Template {
    pub fn new(skeleton: impl Into<String>) -> Self {
        Template {
            skeleton: skeleton.into(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn has_placeholder(&self) -> bool {
        !self.placeholder.is_empty() && self.skeleton.contains(&self.placeholder)
    }

    /// The skeleton with every occurrence of the placeholder replaced by
    /// `slides`, verbatim.
    pub fn compose(&self, slides: &str) -> String {
        if self.placeholder.is_empty() {
            return self.skeleton.clone();
        }
        self.skeleton.replace(&self.placeholder, slides)
    }
}
