use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, TrackerError};

/// Game mode of a statistics series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    QuickPlay,
    Competitive,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::QuickPlay, Mode::Competitive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::QuickPlay => "quick-play",
            Mode::Competitive => "competitive",
        }
    }

    /// Provider query flag (`rq`): 0 for quick play, 1 for competitive
    pub fn rq(&self) -> u8 {
        match self {
            Mode::QuickPlay => 0,
            Mode::Competitive => 1,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quick-play" | "quickplay" | "qp" | "0" => Ok(Mode::QuickPlay),
            "competitive" | "comp" | "1" => Ok(Mode::Competitive),
            _ => Err(TrackerError::Validation(format!(
                "invalid mode '{raw}'; expected quick-play|competitive"
            ))),
        }
    }
}

/// Input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Input {
    #[serde(rename = "PC")]
    Pc,
    Console,
}

impl Input {
    pub const ALL: [Input; 2] = [Input::Pc, Input::Console];

    pub fn as_str(&self) -> &'static str {
        match self {
            Input::Pc => "PC",
            Input::Console => "Console",
        }
    }
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Input {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pc" => Ok(Input::Pc),
            "console" => Ok(Input::Console),
            _ => Err(TrackerError::Validation(format!(
                "invalid input '{raw}'; expected PC|Console"
            ))),
        }
    }
}

/// Server region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Americas,
    Europe,
    Asia,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Americas, Region::Europe, Region::Asia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Americas => "Americas",
            Region::Europe => "Europe",
            Region::Asia => "Asia",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Region {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "americas" => Ok(Region::Americas),
            "europe" => Ok(Region::Europe),
            "asia" => Ok(Region::Asia),
            _ => Err(TrackerError::Validation(format!(
                "invalid region '{raw}'; expected Americas|Europe|Asia"
            ))),
        }
    }
}

/// Skill tier. `All` aggregates every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    All,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
    Grandmaster,
}

impl Tier {
    pub const ALL: [Tier; 8] = [
        Tier::All,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
        Tier::Master,
        Tier::Grandmaster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::All => "All",
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
            Tier::Diamond => "Diamond",
            Tier::Master => "Master",
            Tier::Grandmaster => "Grandmaster",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str().to_ascii_lowercase() == lowered)
            .ok_or_else(|| {
                TrackerError::Validation(format!(
                    "invalid tier '{raw}'; expected All|Bronze|Silver|Gold|Platinum|Diamond|Master|Grandmaster"
                ))
            })
    }
}

/// Map slug, e.g. `all-maps` or `kings-row`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MapName(String);

impl MapName {
    pub const ALL_MAPS: &'static str = "all-maps";

    /// Validate a map slug: non-empty, `[a-z0-9-]` only, no edge hyphens.
    pub fn new(raw: &str) -> Result<Self> {
        let slug = raw.trim();
        let valid = !slug.is_empty()
            && slug.len() <= 64
            && !slug.starts_with('-')
            && !slug.ends_with('-')
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(TrackerError::Validation(format!("invalid map slug '{raw}'")));
        }
        Ok(Self(slug.to_string()))
    }

    pub fn all_maps() -> Self {
        Self(Self::ALL_MAPS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MapName {
    fn default() -> Self {
        Self::all_maps()
    }
}

impl std::fmt::Display for MapName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MapName {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::new(raw)
    }
}

impl TryFrom<String> for MapName {
    type Error = TrackerError;

    fn try_from(raw: String) -> Result<Self> {
        Self::new(&raw)
    }
}

impl From<MapName> for String {
    fn from(map: MapName) -> Self {
        map.0
    }
}

/// Map catalog grouped by game type
pub const CONTROL_MAPS: &[&str] = &[
    "busan",
    "ilios",
    "lijiang-tower",
    "nepal",
    "oasis",
    "antarctic-peninsula",
    "samoa",
];
pub const ESCORT_MAPS: &[&str] = &[
    "dorado",
    "havana",
    "junkertown",
    "rialto",
    "route-66",
    "shambali-monastery",
    "circuit-royal",
];
pub const HYBRID_MAPS: &[&str] = &[
    "blizzard-world",
    "eichenwalde",
    "hollywood",
    "kings-row",
    "midtown",
    "numbani",
    "paraiso",
];
pub const PUSH_MAPS: &[&str] = &["colosseo", "esperanca", "new-queen-street", "runasapi"];
pub const FLASHPOINT_MAPS: &[&str] = &["new-junk-city", "suravasa"];

/// Every known map slug, `all-maps` first
pub fn map_catalog() -> Vec<MapName> {
    std::iter::once(MapName::ALL_MAPS)
        .chain(CONTROL_MAPS.iter().copied())
        .chain(ESCORT_MAPS.iter().copied())
        .chain(HYBRID_MAPS.iter().copied())
        .chain(PUSH_MAPS.iter().copied())
        .chain(FLASHPOINT_MAPS.iter().copied())
        .map(|m| MapName(m.to_string()))
        .collect()
}

/// The addressable axis of measurement. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Combination {
    pub mode: Mode,
    pub input: Input,
    pub region: Region,
    pub tier: Tier,
    #[serde(default)]
    pub map: MapName,
}

impl Combination {
    pub fn new(mode: Mode, input: Input, region: Region, tier: Tier, map: MapName) -> Self {
        Self {
            mode,
            input,
            region,
            tier,
            map,
        }
    }

    /// Combination over all maps
    pub fn all_maps(mode: Mode, input: Input, region: Region, tier: Tier) -> Self {
        Self::new(mode, input, region, tier, MapName::all_maps())
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.mode, self.input, self.region, self.tier, self.map
        )
    }
}

/// Cartesian product of the configured axes, in mode → input → region → tier → map order
#[derive(Debug, Clone)]
pub struct CombinationSpace {
    pub modes: Vec<Mode>,
    pub inputs: Vec<Input>,
    pub regions: Vec<Region>,
    pub tiers: Vec<Tier>,
    pub maps: Vec<MapName>,
}

impl Default for CombinationSpace {
    fn default() -> Self {
        Self {
            modes: Mode::ALL.to_vec(),
            inputs: Input::ALL.to_vec(),
            regions: Region::ALL.to_vec(),
            tiers: Tier::ALL.to_vec(),
            maps: vec![MapName::all_maps()],
        }
    }
}

impl CombinationSpace {
    pub fn len(&self) -> usize {
        self.modes.len() * self.inputs.len() * self.regions.len() * self.tiers.len() * self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn combinations(&self) -> Vec<Combination> {
        let mut out = Vec::with_capacity(self.len());
        for &mode in &self.modes {
            for &input in &self.inputs {
                for &region in &self.regions {
                    for &tier in &self.tiers {
                        for map in &self.maps {
                            out.push(Combination::new(mode, input, region, tier, map.clone()));
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_axes_case_insensitive() {
        assert_eq!("Competitive".parse::<Mode>().unwrap(), Mode::Competitive);
        assert_eq!("pc".parse::<Input>().unwrap(), Input::Pc);
        assert_eq!("EUROPE".parse::<Region>().unwrap(), Region::Europe);
        assert_eq!("grandmaster".parse::<Tier>().unwrap(), Tier::Grandmaster);
        assert!("ranked".parse::<Mode>().is_err());
        assert!("Champion".parse::<Tier>().is_err());
    }

    #[test]
    fn test_map_slug_validation() {
        assert!(MapName::new("kings-row").is_ok());
        assert!(MapName::new("Kings Row").is_err());
        assert!(MapName::new("-busan").is_err());
        assert!(MapName::new("").is_err());
    }

    #[test]
    fn test_default_space_covers_every_enum_value() {
        let space = CombinationSpace::default();
        assert_eq!(space.len(), 2 * 2 * 3 * 8);
        let combos = space.combinations();
        assert_eq!(combos.len(), 96);
        assert_eq!(
            combos[0],
            Combination::all_maps(Mode::QuickPlay, Input::Pc, Region::Americas, Tier::All)
        );
    }

    #[test]
    fn test_map_catalog() {
        let catalog = map_catalog();
        assert_eq!(catalog[0].as_str(), "all-maps");
        assert_eq!(catalog.len(), 1 + 7 + 7 + 7 + 4 + 2);
        assert!(catalog.iter().all(|m| MapName::new(m.as_str()).is_ok()));
    }

    #[test]
    fn test_combination_serde_shape() {
        let combo = Combination::all_maps(Mode::QuickPlay, Input::Pc, Region::Asia, Tier::Gold);
        let json = serde_json::to_value(&combo).unwrap();
        assert_eq!(json["mode"], "quick-play");
        assert_eq!(json["input"], "PC");
        assert_eq!(json["map"], "all-maps");
        let back: Combination = serde_json::from_value(json).unwrap();
        assert_eq!(back, combo);
    }
}
