use interpreter::Namespace;
use slides::block::render_code;
use slides::segmenter::HeadingSegmenter;
use slides::walk::{DocumentBlock, document_blocks};
use slides::{
    CodeBlock, CodeMode, SlideRenderer, Template, check_document, escape_html, render_document,
};

fn code(info: &str, text: &str) -> String {
    let mut namespace = Namespace::new();
    render_code(&CodeBlock::new(Some(info), text), &mut namespace)
}

fn output_block(text: &str) -> String {
    format!(
        r#"<pre><div class="pre-name oneline"><span>output</span></div><code>{}</code></pre>"#,
        text
    )
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

#[test]
fn first_heading_opens_without_closing() {
    let mut segmenter = HeadingSegmenter::new();
    assert!(!segmenter.slide_open());
    assert_eq!(
        segmenter.heading("Intro", 2),
        "\n\n<section class=\"slide\">\n<h2>Intro</h2>\n"
    );
    assert_eq!(
        segmenter.heading("Next", 2),
        "\n</section>\n\n<section class=\"slide\">\n<h2>Next</h2>\n"
    );
    assert!(segmenter.slide_open());
}

#[test]
fn nested_headings_get_breadcrumbs() {
    let mut segmenter = HeadingSegmenter::new();
    segmenter.heading("Lists", 2);
    let nested = segmenter.heading("Slicing", 3);
    assert!(nested.contains(r#"<h3>Lists: <span class="child-header">Slicing</span></h3>"#));
    assert_eq!(segmenter.breadcrumbs(), ["Lists: ", "Slicing: "]);

    let sibling = segmenter.heading("Dicts", 2);
    assert!(sibling.contains("<h2>Dicts</h2>"));
    assert_eq!(segmenter.breadcrumbs(), ["Dicts: "]);
}

#[test]
fn deep_headings_render_at_h3_but_keep_their_level() {
    let mut segmenter = HeadingSegmenter::new();
    segmenter.heading("A", 2);
    segmenter.heading("B", 3);
    segmenter.heading("C", 4);
    let deep = segmenter.heading("D", 5);
    assert!(deep.contains(
        r#"<h3>A: B: C: <span class="child-header">D</span></h3>"#
    ));

    let back_up = segmenter.heading("E", 4);
    assert!(back_up.contains(r#"<h3>A: B: <span class="child-header">E</span></h3>"#));
}

#[test]
fn level_one_starts_a_fresh_trail() {
    let mut segmenter = HeadingSegmenter::new();
    segmenter.heading("Part", 2);
    segmenter.heading("Detail", 3);
    let title = segmenter.heading("Book", 1);
    assert!(title.contains("<h1>Book</h1>"));
    assert_eq!(segmenter.breadcrumbs(), ["Book: "]);
}

// ---------------------------------------------------------------------------
// Code blocks
// ---------------------------------------------------------------------------

#[test]
fn modes_follow_the_info_string() {
    assert_eq!(CodeMode::parse(Some("run:python")), CodeMode::Script);
    assert_eq!(CodeMode::parse(Some("python-repl")), CodeMode::Session);
    assert_eq!(CodeMode::parse(Some("run:ruby")), CodeMode::Unsupported("ruby"));
    assert_eq!(CodeMode::parse(Some("rust ignore")), CodeMode::Plain(Some("rust")));
    assert_eq!(CodeMode::parse(None), CodeMode::Plain(None));
}

#[test]
fn plain_block_is_shown_verbatim() {
    assert_eq!(
        code("rust", "fn main() {}"),
        "\n<pre><div class=\"pre-name oneline\"><span>rust</span></div><code class=\"rust\">fn main() {}</code></pre>\n\n"
    );
}

#[test]
fn block_without_language_has_no_name() {
    let mut namespace = Namespace::new();
    let html = render_code(&CodeBlock::new(None, "a < b"), &mut namespace);
    assert_eq!(html, "\n<pre><code>a &lt; b</code></pre>\n\n");
}

#[test]
fn script_output_follows_the_code() {
    assert_eq!(
        code("run:python", "print(\"hi\")"),
        format!(
            "\n<pre><div class=\"pre-name oneline\"><span>python</span></div><code class=\"python\">print(\"hi\")</code></pre>\n{}\n",
            output_block("hi\n")
        )
    );
}

#[test]
fn silent_script_has_no_output_block() {
    let html = code("run:python", "x = 5");
    assert!(!html.contains("<span>output</span>"));
    assert!(html.ends_with("</pre>\n\n"));
}

#[test]
fn script_fault_is_shown_as_output() {
    let html = code("run:python", "print('partial')\nprint(missing)");
    assert!(html.contains(&output_block("name 'missing' is not defined")));
    assert!(!html.contains("partial\n</code>"));
}

#[test]
fn output_is_escaped() {
    let html = code("run:python", "print('<b> & </b>')");
    assert!(html.contains(&output_block("&lt;b&gt; &amp; &lt;/b&gt;\n")));
}

#[test]
fn session_shows_the_transcript() {
    let html = code("python-repl", ">>> x = 1\n>>> x + 1\n>>> 1 / 0");
    assert_eq!(
        html,
        "\n<pre><div class=\"pre-name oneline\"><span>Python REPL</span></div><code class=\"python\">&gt;&gt;&gt; x = 1\n&gt;&gt;&gt; x + 1\n2\n&gt;&gt;&gt; 1 / 0\nexception: division by zero\n</code></pre>\n\n"
    );
}

#[test]
fn unsupported_run_language_is_only_displayed() {
    let html = code("run:ruby", "puts 1");
    assert!(html.contains("<span>ruby</span>"));
    assert!(html.contains(r#"<code class="ruby">puts 1</code>"#));
    assert!(!html.contains("<span>output</span>"));
}

#[test]
fn escape_covers_markup_characters() {
    assert_eq!(escape_html("a & <b> \"c\""), "a &amp; &lt;b&gt; \"c\"");
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

const TUTORIAL: &str = "\
## Variables

Bind a name first.

```run:python
x = 5
```

### Using it

```run:python
print(x)
```

## Sessions

```python-repl
>>> x * 2
```
";

#[test]
fn walk_classifies_blocks() {
    let blocks = document_blocks(TUTORIAL);
    let kinds: Vec<&str> = blocks
        .iter()
        .map(|block| match block {
            DocumentBlock::Heading { .. } => "heading",
            DocumentBlock::Code(_) => "code",
            DocumentBlock::Other(_) => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        ["heading", "other", "code", "heading", "code", "heading", "code"]
    );
    let DocumentBlock::Code(first) = &blocks[2] else {
        panic!("expected a code block");
    };
    assert_eq!(first.info.as_deref(), Some("run:python"));
    assert_eq!(first.text, "x = 5");
}

#[test]
fn namespace_persists_across_blocks() {
    let mut renderer = SlideRenderer::new();
    let html = renderer.render(TUTORIAL);
    assert!(html.contains(&output_block("5\n")));
    assert!(html.contains("&gt;&gt;&gt; x * 2\n10\n"));
    assert!(renderer.namespace().contains("x"));
}

#[test]
fn document_slides_and_breadcrumbs() {
    let html = render_document(TUTORIAL);
    assert_eq!(html.matches("<section class=\"slide\">").count(), 3);
    assert_eq!(html.matches("</section>").count(), 2);
    assert!(html.contains(r#"<h3>Variables: <span class="child-header">Using it</span></h3>"#));
    assert!(html.contains("<h2>Sessions</h2>"));
    assert!(html.contains("<p>Bind a name first.</p>"));
    assert!(html.starts_with("\n\n<section class=\"slide\">\n<h2>Variables</h2>\n"));
}

#[test]
fn faulting_block_does_not_stop_the_render() {
    let source = "## One\n\n```run:python\n1 / 0\n```\n\n## Two\n\n```run:python\nprint('still here')\n```\n";
    let html = render_document(source);
    assert!(html.contains(&output_block("division by zero")));
    assert!(html.contains(&output_block("still here\n")));
}

#[test]
fn heading_text_keeps_inline_markup() {
    let html = render_document("## Using *emphasis* & `code`\n");
    assert!(html.contains("<h2>Using <em>emphasis</em> &amp; <code>code</code></h2>"));
}

#[test]
fn rendering_is_idempotent() {
    let mut renderer = SlideRenderer::new();
    let first = renderer.render(TUTORIAL);
    let second = renderer.render(TUTORIAL);
    assert_eq!(first, second);
    assert_eq!(first, render_document(TUTORIAL));
}

#[test]
fn template_replaces_every_placeholder() {
    let template = Template::new("<main><!-- SLIDES --></main><!-- SLIDES -->");
    assert!(template.has_placeholder());
    assert_eq!(template.compose("S"), "<main>S</main>S");

    let custom = Template::new("<body>{{slides}}</body>").with_placeholder("{{slides}}");
    assert_eq!(custom.compose("<section></section>"), "<body><section></section></body>");
    assert!(!Template::new("<body></body>").has_placeholder());
}

#[test]
fn check_reports_document_offsets() {
    let source = "# Title\n\n```run:python\nx = = 1\n```\n\n```python-repl\n>>> ok = 2\n>>> y = (\n```\n";
    let errors = check_document(source);
    assert_eq!(errors.len(), 2);

    let script = &errors[0];
    assert_eq!(script.message, "invalid syntax");
    let expected = source.find("= = 1").map(|i| i + 2);
    assert_eq!(Some(script.span.start), expected);
    assert_eq!(&source[script.span.clone()], "=");

    let session = &errors[1];
    assert_eq!(session.message, "'(' was never closed");
    assert_eq!(&source[session.span.clone()], "(");
}

#[test]
fn check_ignores_display_only_blocks() {
    let source = "```python\nx = = 1\n```\n\n```run:ruby\nputs(\n```\n";
    assert!(check_document(source).is_empty());
}

#[test]
fn deeply_nested_block_is_reported_not_fatal() {
    let nested = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    let source = format!("```run:python\nx = {}\n```\n\n```run:python\nprint('after')\n```\n", nested);

    let errors = check_document(&source);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "too many nested parentheses");

    let html = render_document(&source);
    assert!(html.contains(&output_block("too many nested parentheses (&lt;string&gt;, line 1)")));
    assert!(html.contains(&output_block("after\n")));
}
