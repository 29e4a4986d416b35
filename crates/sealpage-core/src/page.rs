//! Locked-page layout
//!
//! A locked page keeps the original `<head>` (unless stripped) and replaces
//! the body contents with:
//! ```text
//! <body {original attributes}>
//!   <script type="application/json" id="sealpage-payload">{"salt":…,"signedMsg":…}</script>
//!   <script type="module">{viewer script, if any}</script>
//!   {login markup}
//! </body>
//! ```
//!
//! Element lookup is a plain first-match scan, ASCII case-insensitive. It is
//! not an HTML parser and does not need to be: the tool only ever rewrites
//! the outermost head and body.

use std::ops::Range;

use sealpage_crypto::{hex, SignedMessage};
use serde::{Deserialize, Serialize};

use crate::error::{SealError, SealResult};

/// Element id of the JSON payload script.
pub const PAYLOAD_SCRIPT_ID: &str = "sealpage-payload";

/// Login markup used when no template is configured.
pub const DEFAULT_LOGIN_TEMPLATE: &str = r#"<style>
  html { height: 100%; }
  body {
    display: grid;
    place-items: center;
    height: 100%;
    margin: 0;
    background-color: rgb(17 24 39);
    color: rgb(241 245 249);
    font: 1rem/1.5rem system-ui, sans-serif;
  }
  @keyframes shake {
    0% { transform: translateX(0); }
    6.5% { transform: translateX(-6px) rotateY(-9deg); }
    18.5% { transform: translateX(5px) rotateY(7deg); }
    31.5% { transform: translateX(-3px) rotateY(-5deg); }
    43.5% { transform: translateX(2px) rotateY(3deg); }
    50% { transform: translateX(0); }
  }
  .shake { animation: shake 2s; }
  main > div { width: min(37rem, 90vw); padding: 2.5rem 1.25rem; border-radius: 0.25rem; background: rgb(30 41 59); }
  input, button { width: 100%; box-sizing: border-box; padding: 0.625rem 0.75rem; border-radius: 0.25rem; }
  button { margin-top: 1rem; font-weight: bold; }
</style>
<main>
  <div>
    <h1>Password</h1>
    <form>
      <label>
        <p>Enter the password for this page.</p>
        <input
          type="password"
          name="password"
          aria-label="Password"
          autocomplete="current-password"
          required
          autofocus
        />
      </label>
      <button type="submit">Unlock</button>
    </form>
  </div>
</main>
"#;

/// The two values a viewer needs to unlock a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedPayload {
    pub salt: String,
    pub signed_msg: String,
}

/// Presentation choices for [`render_locked_page`].
#[derive(Debug, Clone, Default)]
pub struct LockOptions {
    pub remove_head: bool,
    pub minify: bool,
    /// Login markup; [`DEFAULT_LOGIN_TEMPLATE`] when `None`
    pub login_template: Option<String>,
    /// Inlined as a module script after the payload
    pub viewer_script: Option<String>,
}

/// Byte offsets of one element in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementSpan {
    /// `<tag` .. end of `</tag>`
    outer: Range<usize>,
    /// Text between the tag name and `>` of the opening tag
    attrs: Range<usize>,
}

/// Produce the locked version of `html`.
pub fn render_locked_page(
    html: &str,
    payload: &LockedPayload,
    options: &LockOptions,
) -> SealResult<String> {
    let body = find_element(html, "body")
        .ok_or_else(|| SealError::Page("document has no <body> element".into()))?;

    let payload_json =
        serde_json::to_string(payload).map_err(|e| SealError::Page(format!("payload: {e}")))?;

    let mut locked_body = String::new();
    locked_body.push_str("<body");
    locked_body.push_str(&html[body.attrs.clone()]);
    locked_body.push_str(">\n");
    locked_body.push_str(&format!(
        "<script type=\"application/json\" id=\"{PAYLOAD_SCRIPT_ID}\">{payload_json}</script>\n"
    ));
    if let Some(script) = &options.viewer_script {
        if contains_ignore_ascii_case(script, "</script") {
            return Err(SealError::Page(
                "viewer script must not contain a closing </script> tag".into(),
            ));
        }
        locked_body.push_str("<script type=\"module\">\n");
        locked_body.push_str(script);
        locked_body.push_str("\n</script>\n");
    }
    locked_body.push_str(
        options
            .login_template
            .as_deref()
            .unwrap_or(DEFAULT_LOGIN_TEMPLATE),
    );
    locked_body.push_str("\n</body>");

    let mut out = String::with_capacity(html.len() + locked_body.len());
    out.push_str(&html[..body.outer.start]);
    out.push_str(&locked_body);
    out.push_str(&html[body.outer.end..]);

    if options.remove_head {
        if let Some(head) = find_element(&out, "head") {
            out.replace_range(head.outer, "<head></head>");
        }
    }

    if options.minify {
        out = collapse_line_indentation(&out);
    }

    Ok(out)
}

/// Read the payload back out of a locked page.
pub fn extract_payload(html: &str) -> SealResult<LockedPayload> {
    let marker = format!("id=\"{PAYLOAD_SCRIPT_ID}\"");
    let at = html
        .find(&marker)
        .ok_or_else(|| SealError::Page("no sealpage payload found; is this page locked?".into()))?;

    let open_end = html[at..]
        .find('>')
        .map(|i| at + i + 1)
        .ok_or_else(|| SealError::Page("unterminated payload script tag".into()))?;
    let close = find_ignore_ascii_case(html, "</script", open_end)
        .ok_or_else(|| SealError::Page("unterminated payload script".into()))?;

    let payload: LockedPayload = serde_json::from_str(html[open_end..close].trim())
        .map_err(|e| SealError::Page(format!("malformed payload: {e}")))?;

    if payload.salt.is_empty() || !hex::is_hex(&payload.salt) {
        return Err(SealError::Page("payload salt is not hex".into()));
    }
    SignedMessage::parse(&payload.signed_msg)?;

    Ok(payload)
}

/// Elements whose contents are copied through untouched when minifying.
const VERBATIM_ELEMENTS: [&str; 3] = ["script", "pre", "textarea"];

/// Replace every line break that is followed by whitespace, together with
/// that whitespace, by a single space. Contents of [`VERBATIM_ELEMENTS`]
/// are left as they are.
fn collapse_line_indentation(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(verbatim) = next_verbatim_element(html, pos) {
        collapse_segment(&html[pos..verbatim.start], &mut out);
        out.push_str(&html[verbatim.clone()]);
        pos = verbatim.end;
    }
    collapse_segment(&html[pos..], &mut out);
    out
}

fn collapse_segment(segment: &str, out: &mut String) {
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        if (c == '\n' || c == '\r') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            out.push(' ');
            continue;
        }
        out.push(c);
    }
}

/// Earliest verbatim element at or after `from`, opening tag through
/// closing tag. An unclosed element runs to the end of the document.
fn next_verbatim_element(html: &str, from: usize) -> Option<Range<usize>> {
    VERBATIM_ELEMENTS
        .iter()
        .filter_map(|tag| {
            let start = find_open_tag(html, tag, from)?;
            let end = find_ignore_ascii_case(html, &format!("</{tag}"), start)
                .and_then(|close| html[close..].find('>').map(|i| close + i + 1))
                .unwrap_or(html.len());
            Some(start..end)
        })
        .min_by_key(|span| span.start)
}

fn find_element(html: &str, tag: &str) -> Option<ElementSpan> {
    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}");

    let start = find_open_tag(html, tag, 0)?;
    let attrs_start = start + open_pat.len();
    let open_end = attrs_start + html[attrs_start..].find('>')?;
    let close_start = find_ignore_ascii_case(html, &close_pat, open_end + 1)?;
    let close_end = close_start + html[close_start..].find('>')? + 1;

    Some(ElementSpan {
        outer: start..close_end,
        attrs: attrs_start..open_end,
    })
}

/// Offset of the first `<tag` at or after `from` that is a whole tag name.
fn find_open_tag(html: &str, tag: &str, mut from: usize) -> Option<usize> {
    let open_pat = format!("<{tag}");
    loop {
        let idx = find_ignore_ascii_case(html, &open_pat, from)?;
        let after = html.as_bytes().get(idx + open_pat.len()).copied();
        // `<body` must not match `<bodyguard`
        match after {
            Some(b'>') | Some(b'/') => return Some(idx),
            Some(b) if b.is_ascii_whitespace() => return Some(idx),
            None => return None,
            _ => from = idx + open_pat.len(),
        }
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || from > hay.len() {
        return None;
    }
    hay[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|i| from + i)
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    find_ignore_ascii_case(haystack, needle, 0).is_some()
}
