//! Modulation registry
//!
//! Canonical enumeration of every modulation scheme appearing in the
//! supported datasets, with a per-name alias list to absorb the spelling
//! differences between them (`16APSK` vs `APSK16`, `OOK` vs `2ASK`).
//! The first alias of each name is its canonical display label.
//!
//! The alias table must be injective: the same string appearing under
//! two names would make [`ModulationName::from_alias`] ambiguous, so
//! [`ModulationRegistry::new`] verifies uniqueness exhaustively and
//! refuses to construct on a duplicate.

use crate::error::{DatasetError, DatasetResult};

/// Analog/digital split of a modulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationKind {
    Unknown,
    Analog,
    Digital,
}

impl std::fmt::Display for ModulationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModulationKind::Unknown => "Unknown",
            ModulationKind::Analog => "Analog",
            ModulationKind::Digital => "Digital",
        };
        f.pad(s)
    }
}

/// Family a modulation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationFamily {
    Unknown,
    /// Amplitude Modulation
    Am,
    /// Frequency Modulation
    Fm,
    /// Phase Modulation
    Pm,
    /// Amplitude and Phase-Shift Keying
    Apsk,
    /// Amplitude-Shift Keying
    Ask,
    /// Frequency-Shift Keying
    Fsk,
    /// Phase-Shift Keying
    Psk,
    /// Pulse-Amplitude Modulation
    Pam,
    /// Quadrature Amplitude Modulation
    Qam,
}

impl std::fmt::Display for ModulationFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModulationFamily::Unknown => "Unknown",
            ModulationFamily::Am => "Amplitude Modulation",
            ModulationFamily::Fm => "Frequency Modulation",
            ModulationFamily::Pm => "Phase Modulation",
            ModulationFamily::Apsk => "Amplitude and Phase-Shift Keying",
            ModulationFamily::Ask => "Amplitude-Shift Keying",
            ModulationFamily::Fsk => "Frequency-Shift Keying",
            ModulationFamily::Psk => "Phase-Shift Keying",
            ModulationFamily::Pam => "Pulse-Amplitude Modulation",
            ModulationFamily::Qam => "Quadrature Amplitude Modulation",
        };
        f.pad(s)
    }
}

/// Every modulation name across the supported datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModulationName {
    Unknown,

    // analog - AM
    AmSsb,
    AmSsbWc,
    AmSsbSc,
    AmDsb,
    AmDsbWc,
    AmDsbSc,
    AmUsb,
    AmLsb,
    // analog - FM
    Fm,
    Wbfm,
    // analog - PM
    Pm,

    // digital - APSK
    Apsk16,
    Apsk32,
    Apsk64,
    Apsk128,
    // digital - ASK
    Ook,
    Ask4,
    Ask8,
    // digital - FSK
    Fsk2,
    Fsk4,
    Fsk8,
    Fsk16,
    Gfsk,
    Cpfsk,
    Gmsk,
    // digital - PSK
    Bpsk,
    Qpsk,
    Psk8,
    Psk16,
    Psk32,
    Psk64,
    Oqpsk,
    // digital - PAM
    Pam4,
    Pam8,
    Pam16,
    // digital - QAM
    Qam4,
    Qam8,
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Qam256,
}

/// Alias lists, canonical label first. `Unknown` carries no aliases.
pub const MODULATION_NAME_ALIAS: &[(ModulationName, &[&str])] = &[
    // analog - AM
    (ModulationName::AmSsb, &["AM-SSB"]),
    (ModulationName::AmSsbWc, &["AM-SSB WC"]),
    (ModulationName::AmSsbSc, &["AM-SSB SC"]),
    (ModulationName::AmDsb, &["AM-DSB"]),
    (ModulationName::AmDsbWc, &["AM-DSB WC"]),
    (ModulationName::AmDsbSc, &["AM-DSB SC"]),
    (ModulationName::AmUsb, &["AM-USB"]),
    (ModulationName::AmLsb, &["AM-LSB"]),
    // analog - FM
    (ModulationName::Fm, &["FM"]),
    (ModulationName::Wbfm, &["WBFM"]),
    // analog - PM
    (ModulationName::Pm, &["PM"]),
    // digital - APSK
    (ModulationName::Apsk16, &["16APSK", "APSK16"]),
    (ModulationName::Apsk32, &["32APSK", "APSK32"]),
    (ModulationName::Apsk64, &["64APSK", "APSK64"]),
    (ModulationName::Apsk128, &["128APSK", "APSK128"]),
    // digital - ASK
    (ModulationName::Ook, &["OOK", "2ASK", "ASK2"]),
    (ModulationName::Ask4, &["4ASK", "ASK4"]),
    (ModulationName::Ask8, &["8ASK", "ASK8"]),
    // digital - FSK
    (ModulationName::Fsk2, &["2FSK", "FSK2"]),
    (ModulationName::Fsk4, &["4FSK", "FSK4"]),
    (ModulationName::Fsk8, &["8FSK", "FSK8"]),
    (ModulationName::Fsk16, &["16FSK", "FSK16"]),
    (ModulationName::Gfsk, &["GFSK"]),
    (ModulationName::Cpfsk, &["CPFSK"]),
    (ModulationName::Gmsk, &["GMSK"]),
    // digital - PSK
    (ModulationName::Bpsk, &["BPSK", "2PSK", "PSK2"]),
    (ModulationName::Qpsk, &["QPSK", "4PSK", "PSK4"]),
    (ModulationName::Psk8, &["8PSK", "PSK8"]),
    (ModulationName::Psk16, &["16PSK", "PSK16"]),
    (ModulationName::Psk32, &["32PSK", "PSK32"]),
    (ModulationName::Psk64, &["64PSK", "PSK64"]),
    (ModulationName::Oqpsk, &["OQPSK"]),
    // digital - PAM
    (ModulationName::Pam4, &["4PAM", "PAM4"]),
    (ModulationName::Pam8, &["8PAM", "PAM8"]),
    (ModulationName::Pam16, &["16PAM", "PAM16"]),
    // digital - QAM
    (ModulationName::Qam4, &["4QAM", "QAM4"]),
    (ModulationName::Qam8, &["8QAM", "QAM8"]),
    (ModulationName::Qam16, &["16QAM", "QAM16"]),
    (ModulationName::Qam32, &["32QAM", "QAM32"]),
    (ModulationName::Qam64, &["64QAM", "QAM64"]),
    (ModulationName::Qam128, &["128QAM", "QAM128"]),
    (ModulationName::Qam256, &["256QAM", "QAM256"]),
];

impl ModulationName {
    /// Resolve a dataset spelling to a name. Case-sensitive exact match;
    /// `Unknown` when the string matches no alias.
    pub fn from_alias(text: &str) -> ModulationName {
        for (name, aliases) in MODULATION_NAME_ALIAS {
            if aliases.iter().any(|a| *a == text) {
                return *name;
            }
        }
        ModulationName::Unknown
    }

    /// All alias spellings of this name, canonical label first.
    pub fn aliases(self) -> &'static [&'static str] {
        MODULATION_NAME_ALIAS
            .iter()
            .find(|(name, _)| *name == self)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }

    /// Canonical display label (first alias); empty for `Unknown`.
    pub fn canonical(self) -> &'static str {
        self.aliases().first().copied().unwrap_or("")
    }

    /// Family the modulation belongs to.
    pub fn family(self) -> ModulationFamily {
        use ModulationName::*;
        match self {
            AmSsb | AmSsbWc | AmSsbSc | AmDsb | AmDsbWc | AmDsbSc | AmUsb | AmLsb => {
                ModulationFamily::Am
            }
            Fm | Wbfm => ModulationFamily::Fm,
            Pm => ModulationFamily::Pm,
            Apsk16 | Apsk32 | Apsk64 | Apsk128 => ModulationFamily::Apsk,
            Ook | Ask4 | Ask8 => ModulationFamily::Ask,
            Fsk2 | Fsk4 | Fsk8 | Fsk16 | Gfsk | Cpfsk | Gmsk => ModulationFamily::Fsk,
            Bpsk | Qpsk | Psk8 | Psk16 | Psk32 | Psk64 | Oqpsk => ModulationFamily::Psk,
            Pam4 | Pam8 | Pam16 => ModulationFamily::Pam,
            Qam4 | Qam8 | Qam16 | Qam32 | Qam64 | Qam128 | Qam256 => ModulationFamily::Qam,
            Unknown => ModulationFamily::Unknown,
        }
    }

    /// Analog/digital classification.
    pub fn kind(self) -> ModulationKind {
        match self.family() {
            ModulationFamily::Am | ModulationFamily::Fm | ModulationFamily::Pm => {
                ModulationKind::Analog
            }
            ModulationFamily::Unknown => ModulationKind::Unknown,
            _ => ModulationKind::Digital,
        }
    }
}

impl std::fmt::Display for ModulationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.canonical())
    }
}

/// Validated view over the alias table.
///
/// Construction verifies alias uniqueness; everything downstream can then
/// rely on [`ModulationName::from_alias`] being unambiguous. Built once at
/// process start and passed down by reference.
#[derive(Debug, Clone, Copy)]
pub struct ModulationRegistry(());

impl ModulationRegistry {
    /// Verify the alias table and return a registry handle.
    pub fn new() -> DatasetResult<Self> {
        verify_unique(MODULATION_NAME_ALIAS)?;
        Ok(ModulationRegistry(()))
    }

    /// See [`ModulationName::from_alias`].
    pub fn lookup(&self, text: &str) -> ModulationName {
        ModulationName::from_alias(text)
    }

    /// See [`ModulationName::canonical`].
    pub fn canonical(&self, name: ModulationName) -> &'static str {
        name.canonical()
    }
}

/// Exhaustive pairwise check that no alias string appears under two names
/// and that every listed name has at least one alias.
fn verify_unique(table: &[(ModulationName, &[&str])]) -> DatasetResult<()> {
    for (i, (_, one)) in table.iter().enumerate() {
        if one.is_empty() {
            return Err(DatasetError::DuplicateAlias(String::new()));
        }

        for (_, two) in &table[i + 1..] {
            for alias in *two {
                if one.contains(alias) {
                    return Err(DatasetError::DuplicateAlias((*alias).to_string()));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_constructs() {
        assert!(ModulationRegistry::new().is_ok());
    }

    #[test]
    fn aliases_round_trip() {
        for (name, aliases) in MODULATION_NAME_ALIAS {
            assert!(!aliases.is_empty());
            assert_eq!(*aliases.first().unwrap(), name.canonical());

            for alias in *aliases {
                assert_eq!(ModulationName::from_alias(alias), *name, "alias {}", alias);
            }
        }
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        assert_eq!(ModulationName::from_alias("QPSK"), ModulationName::Qpsk);
        assert_eq!(ModulationName::from_alias("qpsk"), ModulationName::Unknown);
        assert_eq!(ModulationName::from_alias("QPSK "), ModulationName::Unknown);
        assert_eq!(ModulationName::from_alias(""), ModulationName::Unknown);
    }

    #[test]
    fn families_and_kinds() {
        assert_eq!(ModulationName::Qam16.family(), ModulationFamily::Qam);
        assert_eq!(ModulationName::Qam16.kind(), ModulationKind::Digital);
        assert_eq!(ModulationName::AmUsb.family(), ModulationFamily::Am);
        assert_eq!(ModulationName::AmUsb.kind(), ModulationKind::Analog);
        assert_eq!(ModulationName::Gmsk.family(), ModulationFamily::Fsk);
        assert_eq!(ModulationName::Unknown.kind(), ModulationKind::Unknown);
    }

    #[test]
    fn family_strings() {
        assert_eq!(
            ModulationFamily::Qam.to_string(),
            "Quadrature Amplitude Modulation"
        );
        assert_eq!(ModulationKind::Analog.to_string(), "Analog");
    }

    #[test]
    fn injected_duplicate_is_detected() {
        let table: &[(ModulationName, &[&str])] = &[
            (ModulationName::Bpsk, &["BPSK", "2PSK"]),
            (ModulationName::Qpsk, &["QPSK", "2PSK"]),
        ];

        match verify_unique(table) {
            Err(DatasetError::DuplicateAlias(alias)) => assert_eq!(alias, "2PSK"),
            other => panic!("expected duplicate alias, got {:?}", other),
        }
    }
}
