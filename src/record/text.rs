use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("tag pattern should compile"));

/// Strip `<...>` markup, turn newlines into `"; "`, then collapse runs of
/// whitespace to single spaces and trim the ends.
pub fn clean_cell(raw: &str) -> String {
    let stripped = TAG.replace_all(raw, "");
    stripped
        .replace('\n', "; ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply `clean_cell` to every cell of a row in place.
pub fn clean_row(cells: &mut [String]) {
    for cell in cells.iter_mut() {
        *cell = clean_cell(cell);
    }
}
