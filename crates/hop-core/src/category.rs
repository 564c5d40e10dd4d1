//! Rewrite categories: which kind of reference an attribute holds.

/// Classification of a rewritten reference. Each category has its own
/// toggle (`r_<key>` query flag), raw flag and counter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RewriteCategory {
    /// Anchor `href`.
    Url,
    /// Image `src`.
    Img,
    /// Script `src`.
    Js,
    /// Form `action`.
    Form,
    /// Stylesheet `link` `href`.
    Css,
    /// Video-typed `source` `src`.
    Video,
    /// Literal occurrences of the origin host, swapped for the IP in IP-source mode.
    DomainToIp,
}

impl RewriteCategory {
    /// Every category, in the order their toggles appear in generated URLs.
    pub const ALL: [RewriteCategory; 7] = [
        RewriteCategory::Url,
        RewriteCategory::Img,
        RewriteCategory::Js,
        RewriteCategory::Form,
        RewriteCategory::Css,
        RewriteCategory::Video,
        RewriteCategory::DomainToIp,
    ];

    /// Query key of the presence-based toggle for this category.
    pub fn toggle_key(self) -> &'static str {
        match self {
            RewriteCategory::Url => "r_url",
            RewriteCategory::Img => "r_img",
            RewriteCategory::Js => "r_js",
            RewriteCategory::Form => "r_form",
            RewriteCategory::Css => "r_css",
            RewriteCategory::Video => "r_video",
            RewriteCategory::DomainToIp => "r_ip",
        }
    }

    /// Whether generated links for this category carry `x=1`.
    ///
    /// Navigations (anchors, forms) load a page; everything else is an asset.
    pub fn is_raw(self) -> bool {
        !matches!(self, RewriteCategory::Url | RewriteCategory::Form)
    }

    pub fn counter_name(self) -> &'static str {
        match self {
            RewriteCategory::Url => "rewritten_url",
            RewriteCategory::Img => "rewritten_img",
            RewriteCategory::Js => "rewritten_js",
            RewriteCategory::Form => "rewritten_form",
            RewriteCategory::Css => "rewritten_css",
            RewriteCategory::Video => "rewritten_video",
            RewriteCategory::DomainToIp => "rewritten_ip",
        }
    }
}
