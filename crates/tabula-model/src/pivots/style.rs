/// Style applied when a pivot table does not name one.
pub const DEFAULT_PIVOT_STYLE_NAME: &str = "PivotStyleLight16";

/// Number of built-in styles per family (`PivotStyleLight1` .. `PivotStyleLight28`).
const STYLES_PER_FAMILY: u8 = 28;

/// Built-in pivot table style families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PivotStyleFamily {
    Light,
    Medium,
    Dark,
}

impl PivotStyleFamily {
    pub const ALL: [PivotStyleFamily; 3] = [
        PivotStyleFamily::Light,
        PivotStyleFamily::Medium,
        PivotStyleFamily::Dark,
    ];

    fn prefix(self) -> &'static str {
        match self {
            PivotStyleFamily::Light => "PivotStyleLight",
            PivotStyleFamily::Medium => "PivotStyleMedium",
            PivotStyleFamily::Dark => "PivotStyleDark",
        }
    }
}

/// All 84 built-in pivot style names, light first.
pub fn builtin_pivot_style_names() -> impl Iterator<Item = String> {
    PivotStyleFamily::ALL.into_iter().flat_map(|family| {
        (1..=STYLES_PER_FAMILY).map(move |n| format!("{}{n}", family.prefix()))
    })
}

/// Returns true for one of the built-in `PivotStyle{Light,Medium,Dark}{1..=28}` names.
///
/// Other names are still written verbatim; this is a convenience for callers that want to
/// validate input.
pub fn is_builtin_pivot_style(name: &str) -> bool {
    PivotStyleFamily::ALL.into_iter().any(|family| {
        name.strip_prefix(family.prefix())
            .filter(|n| !n.starts_with('0'))
            .and_then(|n| n.parse::<u8>().ok())
            .is_some_and(|n| (1..=STYLES_PER_FAMILY).contains(&n))
    })
}
