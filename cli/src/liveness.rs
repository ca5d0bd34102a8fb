use std::sync::LazyLock;

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;

const ARTICLE_BASE: &str = "https://en.wikipedia.org/wiki/";

/// Opening tags of tables carrying `infobox` among their classes.
static INFOBOX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<table\b[^>]*\bclass="[^"]*\binfobox\b[^"]*"[^>]*>"#).unwrap()
});

/// Any table open or close tag.
static TABLE_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)table\b[^>]*>").unwrap());

/// Row header cells, with their contents.
static ROW_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<th\b[^>]*\bscope="row"[^>]*>(.*?)</th>"#).unwrap()
});

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h1\b[^>]*\bid="firstHeading"[^>]*>(.*?)</h1>"#).unwrap()
});

pub fn article_url(name: &str) -> String {
    format!("{}{}", ARTICLE_BASE, urlencoding::encode(name))
}

/// Contents of every infobox, each running to its own closing tag so that
/// tables nested inside it stay inside.
fn infobox_contents(html: &str) -> Vec<&str> {
    let mut contents = Vec::new();
    let mut from = 0;
    while let Some(open) = INFOBOX_REGEX.find_at(html, from) {
        let mut depth = 1usize;
        let mut end = html.len();
        for tag in TABLE_TAG_REGEX.captures_iter(&html[open.end()..]) {
            depth = if tag[1].is_empty() { depth + 1 } else { depth - 1 };
            if depth == 0 {
                end = open.end() + tag.get(0).map_or(0, |m| m.start());
                break;
            }
        }
        contents.push(&html[open.end()..end]);
        from = end;
    }
    contents
}

/// Whether any infobox on the page has a row labelled with "died".
pub fn page_reports_death(html: &str) -> bool {
    infobox_contents(html).into_iter().any(|table| {
        ROW_HEADER_REGEX.captures_iter(table).any(|header| {
            TAG_REGEX
                .replace_all(&header[1], "")
                .to_lowercase()
                .contains("died")
        })
    })
}

/// The article title, as shown in the page heading.
pub fn page_title(html: &str) -> Option<String> {
    TITLE_REGEX
        .captures(html)
        .map(|title| TAG_REGEX.replace_all(&title[1], "").trim().to_string())
}

/// Fetch the article for `name`. Error statuses still return their page.
pub fn fetch_article(name: &str) -> Result<String> {
    let url = article_url(name);
    debug!("fetching {}", url);
    let response = match ureq::get(&url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            debug!("{} answered with status {}", url, code);
            response
        }
        Err(error) => return Err(error).with_context(|| format!("cannot fetch '{}'", url)),
    };
    response
        .into_string()
        .with_context(|| format!("cannot read the page at '{}'", url))
}

/// `"<name> is alive."` or `"<name> is dead."`.
pub fn report(name: &str, html: &str) -> String {
    if let Some(title) = page_title(html) {
        debug!("article title: {}", title);
    }
    let state = if page_reports_death(html) {
        "dead"
    } else {
        "alive"
    };
    format!("{} is {}.", name, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD: &str = r#"
<h1 id="firstHeading" class="firstHeading"><span>Ada Lovelace</span></h1>
<table class="infobox biography vcard">
  <tbody>
    <tr><th scope="row" class="infobox-label">Born</th><td>10 December 1815</td></tr>
    <tr><th scope="row" class="infobox-label">Died</th><td>27 November 1852</td></tr>
  </tbody>
</table>
"#;

    const ALIVE: &str = r#"
<table class="infobox vcard">
  <tr><th scope="row">Born</th><td>1955</td></tr>
  <tr><th scope="row">Occupation</th><td>Engineer</td></tr>
</table>
<table class="wikitable"><tr><th scope="row">Died</th></tr></table>
"#;

    #[test]
    fn died_row_in_an_infobox_means_dead() {
        assert!(page_reports_death(DEAD));
        assert_eq!(report("Ada Lovelace", DEAD), "Ada Lovelace is dead.");
    }

    #[test]
    fn died_rows_outside_infoboxes_are_ignored() {
        assert!(!page_reports_death(ALIVE));
        assert_eq!(report("Someone", ALIVE), "Someone is alive.");
    }

    #[test]
    fn label_markup_is_ignored() {
        let html = r#"<table class="infobox"><tr><th scope="row"><span>D</span>ied</th></tr></table>"#;
        assert!(page_reports_death(html));
    }

    #[test]
    fn nested_tables_do_not_end_the_infobox() {
        let html = r#"
<table class="infobox vcard">
  <tr><td><table class="nowrap"><tr><td>Signature</td></tr></table></td></tr>
  <tr><th scope="row">Died</th><td>1852</td></tr>
</table>
<table class="wikitable"><tr><th scope="row">Other</th></tr></table>
"#;
        assert!(page_reports_death(html));
        assert_eq!(infobox_contents(html).len(), 1);
    }

    #[test]
    fn unclosed_infobox_runs_to_the_end() {
        let html = r#"<table class="infobox"><tr><th scope="row">Died</th></tr>"#;
        assert!(page_reports_death(html));
    }

    #[test]
    fn missing_page_is_alive() {
        assert!(!page_reports_death("<html><body>No such article</body></html>"));
    }

    #[test]
    fn title_is_extracted() {
        assert_eq!(page_title(DEAD).as_deref(), Some("Ada Lovelace"));
        assert_eq!(page_title(ALIVE), None);
    }

    #[test]
    fn names_are_url_encoded() {
        assert_eq!(
            article_url("Grace Hopper"),
            "https://en.wikipedia.org/wiki/Grace%20Hopper"
        );
    }
}
