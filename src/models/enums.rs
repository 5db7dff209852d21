use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Extra literals after `|` are accepted as aliases when parsing.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal $(| $alias:literal)*),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $s $(, alias = $alias)*)]
                $variant
            ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s $(| $alias)* => Ok(Self::$variant)),+,
                    _ => Err(ValidationError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use str_enum;

str_enum!(Sex {
    Male => "M",
    Female => "F",
    Other => "Other",
});

str_enum!(Profile {
    Acute => "acute",
    Subacute => "subacute",
    Chronic => "chronic",
    Unknown => "unknown",
});

str_enum!(Onset {
    Thunderclap => "thunderclap",
    Progressive => "progressive",
    Chronic => "chronic",
    Unknown => "unknown",
});

str_enum!(HeadacheProfile {
    MigraineLike => "migraine_like",
    TensionLike => "tension_like",
    ClusterLike => "cluster_like",
    Unknown => "unknown",
});

str_enum!(VisualDisturbance {
    Stroboscopic => "stroboscopic",
    Blur => "blur",
    Blindness => "blindness",
    None => "none",
});

str_enum!(HeadacheLocation {
    Frontal => "frontal",
    Temporal => "temporal",
    Occipital => "occipital",
    Unilateral => "unilateral",
    Diffuse => "diffuse",
});

str_enum!(Urgency {
    None => "none",
    Routine => "routine" | "delayed",
    Urgent => "urgent",
    Immediate => "immediate",
});

str_enum!(ImagingExam {
    ScannerSansInjection => "scanner_cerebral_sans_injection",
    ScannerAvecInjection => "scanner_cerebral_avec_injection",
    Angioscanner => "angioscanner_cerebral" | "angioscanner",
    AngioscannerTsa => "angioscanner_TSA",
    IrmCerebrale => "irm_cerebrale" | "IRM_cerebrale",
    IrmGadolinium => "IRM_cerebrale_avec_gadolinium",
    ArmCerebrale => "ARM_cerebrale" | "angio_irm",
    AngioIrmVeineuse => "angio_irm_veineuse" | "venographie_IRM",
    PonctionLombaire => "ponction_lombaire",
    FondOeil => "fond_oeil",
    DopplerTsa => "doppler_TSA",
    EchographieTemporale => "echographie_arteres_temporales",
    BiopsieTemporale => "biopsie_artere_temporale",
    IrmRachis => "irm_rachis",
});

impl Default for Sex {
    fn default() -> Self {
        Self::Other
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Default for Onset {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Default for HeadacheProfile {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Self::None
    }
}

impl Urgency {
    /// Severity rank, higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Routine => 1,
            Self::Urgent => 2,
            Self::Immediate => 3,
        }
    }
}

impl ImagingExam {
    pub fn is_scanner(&self) -> bool {
        matches!(
            self,
            Self::ScannerSansInjection
                | Self::ScannerAvecInjection
                | Self::Angioscanner
                | Self::AngioscannerTsa
        )
    }

    pub fn is_contrast_scanner(&self) -> bool {
        matches!(
            self,
            Self::ScannerAvecInjection | Self::Angioscanner | Self::AngioscannerTsa
        )
    }

    pub fn is_mri(&self) -> bool {
        matches!(
            self,
            Self::IrmCerebrale
                | Self::IrmGadolinium
                | Self::ArmCerebrale
                | Self::AngioIrmVeineuse
                | Self::IrmRachis
        )
    }

    /// Human-readable label used in dialogue messages.
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn exam_parses_canonical_and_alias() {
        assert_eq!(
            ImagingExam::from_str("angio_irm").unwrap(),
            ImagingExam::ArmCerebrale
        );
        assert_eq!(
            ImagingExam::from_str("IRM_cerebrale").unwrap(),
            ImagingExam::IrmCerebrale
        );
        assert_eq!(ImagingExam::IrmCerebrale.as_str(), "irm_cerebrale");
    }

    #[test]
    fn unknown_exam_is_rejected() {
        let err = ImagingExam::from_str("radiographie_crane").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEnum { .. }));
        assert!(serde_json::from_str::<ImagingExam>("\"tep_scan\"").is_err());
    }

    #[test]
    fn delayed_urgency_reads_as_routine() {
        let u: Urgency = serde_json::from_str("\"delayed\"").unwrap();
        assert_eq!(u, Urgency::Routine);
        assert_eq!(serde_json::to_string(&u).unwrap(), "\"routine\"");
    }

    #[test]
    fn urgency_rank_is_ordered() {
        assert!(Urgency::Immediate.rank() > Urgency::Urgent.rank());
        assert!(Urgency::Urgent.rank() > Urgency::Routine.rank());
        assert!(Urgency::Routine.rank() > Urgency::None.rank());
    }

    #[test]
    fn exam_label_replaces_underscores() {
        assert_eq!(ImagingExam::PonctionLombaire.label(), "ponction lombaire");
    }

    #[test]
    fn sex_serializes_short_codes() {
        assert_eq!(serde_json::to_string(&Sex::Female).unwrap(), "\"F\"");
        assert_eq!(Sex::default(), Sex::Other);
    }
}
