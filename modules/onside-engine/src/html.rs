use std::sync::LazyLock;

use scraper::{Html, Node, Selector};

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Visible text of a document, one trimmed text run per line.
pub(crate) fn visible_text(document: &Html) -> String {
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let run = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !run.is_empty() {
            lines.push(run);
        }
    }
    lines.join("\n")
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_scripts_and_styles() {
        let doc = Html::parse_document(
            "<html><head><title>T</title><style>p{}</style></head>\
             <body><h1>Pricing</h1><script>var x = 1;</script>\
             <p>Starts at   $10\n per month</p></body></html>",
        );
        assert_eq!(visible_text(&doc), "Pricing\nStarts at $10 per month");
    }

    #[test]
    fn counts_words() {
        assert_eq!(word_count("one two\nthree"), 3);
        assert_eq!(word_count("   "), 0);
    }
}
