use serde::Deserialize;

/// Page sections in scroll order. The active one is owned by scroll tracking;
/// the composer only reads it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    #[default]
    Hero,
    About,
    Projects,
    Experience,
    Contact,
}

impl SectionKey {
    /// All sections in page order.
    pub const ALL: &'static [SectionKey] = &[
        SectionKey::Hero,
        SectionKey::About,
        SectionKey::Projects,
        SectionKey::Experience,
        SectionKey::Contact,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::About => "about",
            Self::Projects => "projects",
            Self::Experience => "experience",
            Self::Contact => "contact",
        }
    }

    /// Position of the section on the page, top to bottom.
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|&s| s == self)
            .unwrap_or_default()
    }

    /// Section at a page position, clamped to the last section.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|section| section.label() == s)
            .ok_or_else(|| format!("unknown section '{s}'"))
    }
}
