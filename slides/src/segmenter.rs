use log::debug;

/// Turns headings into slide boundaries with breadcrumb titles.
#[derive(Debug, Clone, Default)]
pub struct HeadingSegmenter {
    slide_open: bool,
    /// `"{text}: "` for each enclosing heading, outermost first.
    crumbs: Vec<String>,
}

impl HeadingSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markup for a heading: closes the previous slide (if any), opens a new
    /// one and titles it with the breadcrumb trail of enclosing headings.
    ///
    /// `text` is already HTML. Levels 1 and 2 start a fresh trail; deeper
    /// levels keep the crumbs above them. Rendered heading size stops at `h3`.
    pub fn heading(&mut self, text: &str, level: u8) -> String {
        let close = if self.slide_open { "</section>\n" } else { "" };
        self.slide_open = true;

        self.crumbs.truncate(usize::from(level.saturating_sub(2)));
        let trail = self.crumbs.concat();
        self.crumbs.push(format!("{}: ", text));
        debug!(
            "slide at level {} with {} enclosing heading(s)",
            level,
            self.crumbs.len() - 1
        );

        let title = if trail.is_empty() {
            text.to_string()
        } else {
            format!(r#"{}<span class="child-header">{}</span>"#, trail, text)
        };
        let size = level.clamp(1, 3);

        format!(
            "\n{}\n<section class=\"slide\">\n<h{size}>{}</h{size}>\n",
            close, title
        )
    }

    /// The crumbs a heading one level deeper than the last would inherit.
    pub fn breadcrumbs(&self) -> &[String] {
        &self.crumbs
    }

    /// Whether a slide section has been opened.
    pub fn slide_open(&self) -> bool {
        self.slide_open
    }

    pub fn reset(&mut self) {
        self.slide_open = false;
        self.crumbs.clear();
    }
}
