//! Slugs: filesystem and URL safe fragments derived from arbitrary text.

use unicode_normalization::UnicodeNormalization;

/// Longest slug ever produced.
pub const MAX_SLUG_LEN: usize = 200;

/// Turn arbitrary text into a slug made of `[a-z0-9_-]`.
///
/// Whitespace runs become `-`, accented letters fold to their base letter
/// through canonical decomposition, and everything else outside ASCII word
/// characters and `-` is dropped (scripts without a Latin decomposition
/// vanish entirely). Leading and trailing `_` are trimmed, the result is cut
/// at [`MAX_SLUG_LEN`] and lowercased.
///
/// The result may be empty. It never fails.
pub fn make_safe_name(name: &str) -> String {
    let dashed = collapse_whitespace(name);

    let mut slug: String = dashed
        .nfd()
        .filter(|c| is_slug_char(*c))
        .collect();

    trim_underscores(&mut slug);
    if slug.len() > MAX_SLUG_LEN {
        // All remaining chars are ASCII, so byte length == char count.
        slug.truncate(MAX_SLUG_LEN);
        trim_underscores(&mut slug);
    }
    slug.make_ascii_lowercase();
    slug
}

/// Slug for a URL path where each `/` separator is kept as `_`.
///
/// `/hello/1/2/3__!/ẮČĖ--ace/¥$$/$/and/¿?` becomes `hello_1_2_3___ace--ace___and`.
pub fn make_safe_name_from_url(url_path: &str) -> String {
    make_safe_name(&url_path.replace('/', "_"))
}

/// Drop every character that cannot appear in a slug, without any folding.
pub(crate) fn sanitise(s: &str) -> String {
    s.chars().filter(|c| is_slug_char(*c)).collect()
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push('-');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

fn trim_underscores(slug: &mut String) {
    let end = slug.trim_end_matches('_').len();
    slug.truncate(end);
    let start = slug.len() - slug.trim_start_matches('_').len();
    if start > 0 {
        slug.drain(..start);
    }
}
