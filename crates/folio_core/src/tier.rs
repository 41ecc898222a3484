/// Coarse rendering capability of the host, classified once at startup.
/// The tier picks a baseline `RenderConfig`; the quality signal scales within it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PerformanceTier {
    /// Integrated/mobile GPUs, software adapters, or anything we could not read.
    #[default]
    Low,
    /// Unrecognised discrete or mid-range adapters.
    Medium,
    /// Known high-end desktop GPUs.
    High,
}

impl PerformanceTier {
    /// All tiers from least to most capable.
    pub const ALL: &'static [PerformanceTier] = &[
        PerformanceTier::Low,
        PerformanceTier::Medium,
        PerformanceTier::High,
    ];

    /// Short human-readable label for overlay display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// One level down, saturating at `Low`.
    pub fn downgrade(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

impl std::fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_low() {
        assert_eq!(PerformanceTier::default(), PerformanceTier::Low);
    }

    #[test]
    fn downgrade_steps_one_level() {
        assert_eq!(PerformanceTier::High.downgrade(), PerformanceTier::Medium);
        assert_eq!(PerformanceTier::Medium.downgrade(), PerformanceTier::Low);
    }

    #[test]
    fn downgrade_saturates_at_low() {
        assert_eq!(PerformanceTier::Low.downgrade(), PerformanceTier::Low);
        assert_eq!(
            PerformanceTier::High.downgrade().downgrade().downgrade(),
            PerformanceTier::Low
        );
    }

    #[test]
    fn display_matches_label() {
        for &tier in PerformanceTier::ALL {
            assert_eq!(format!("{}", tier), tier.label());
        }
    }

    #[test]
    fn all_is_ordered_by_capability() {
        assert_eq!(PerformanceTier::ALL.len(), 3);
        assert!(PerformanceTier::ALL.windows(2).all(|w| w[0] < w[1]));
    }
}
