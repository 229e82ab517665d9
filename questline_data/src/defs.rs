use serde::{Deserialize, Serialize};

/// Stable identifier used across `AtlasDef` references.
pub type Id = String;

/// Numeric map identifier as reported by the game.
pub type MapNum = u32;

/// A `(row, col)` pair in the shared global plane.
pub type Point = (i32, i32);

/// Border added on both axes so no global coordinate is negative.
pub const GLOBAL_PAD: i32 = 20;

/// Top-level atlas data loaded by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AtlasDef {
    pub meta: MetaDef,
    #[serde(default)]
    pub maps: Vec<MapDef>,
    #[serde(default)]
    pub warps: Vec<WarpDef>,
    #[serde(default)]
    pub tilesets: Vec<TilesetDef>,
    #[serde(default)]
    pub quests: Vec<QuestDef>,
}

/// Descriptive metadata for an atlas file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetaDef {
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
}

/// A single map and its placement in the global plane.
///
/// `origin` is the offset of local tile (0, 0) before the global padding is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDef {
    pub id: MapNum,
    pub name: String,
    pub origin: Point,
    pub height: u32,
    pub width: u32,
    #[serde(default)]
    pub tileset: Option<Id>,
}

/// A tile that moves the agent to another map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarpDef {
    pub map: MapNum,
    pub at: Point,
    pub to: MapNum,
    /// Direction to press while standing on the tile, for warps that do not fire on entry.
    #[serde(default)]
    pub exit: Option<DirectionDef>,
}

/// Tile-pair transition data for one tileset.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TilesetDef {
    pub id: Id,
    /// Tile pairs that can never be crossed, in either direction.
    #[serde(default)]
    pub impassable: Vec<(u16, u16)>,
    #[serde(default)]
    pub one_way: Vec<OneWayDef>,
}

/// A ledge: `from -> to` is only legal when moving in `allowed`, `to -> from` never is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneWayDef {
    pub from: u16,
    pub to: u16,
    pub allowed: DirectionDef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectionDef {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeDef {
    North,
    South,
    East,
    West,
}

/// A mandatory objective, in atlas order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestDef {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prerequisites: Vec<Id>,
    #[serde(default)]
    pub segments: Vec<SegmentDef>,
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
    #[serde(default)]
    pub stage_rules: Vec<StageRuleDef>,
}

/// Ordered global points for one quest on one map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDef {
    pub map: MapNum,
    pub points: Vec<Point>,
}

/// Externally observable facts that complete a quest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerDef {
    EventFlag { flag: String },
    MissingEventFlag { flag: String },
    HasItem {
        item: Id,
        #[serde(default = "default_quantity")]
        min: u32,
    },
    MissingItem { item: Id },
    InMap { map: MapNum },
    PreviousMap { map: MapNum },
    MapTransition { from: MapNum, to: MapNum },
    PartySize { min: u8 },
    DialogContains { text: String },
    /// Regular expression matched against whitespace-normalised dialog text.
    DialogMatches { pattern: String },
    AtCoordinate { map: MapNum, at: Point },
    InArea { map: MapNum, top_left: Point, bottom_right: Point },
    QuestCompleted { quest: Id },
}

fn default_quantity() -> u32 {
    1
}

/// A scripted override evaluated while its quest is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRuleDef {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<RuleConditionDef>,
    pub effect: RuleEffectDef,
    #[serde(default)]
    pub only_once: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleConditionDef {
    At { map: MapNum, at: Point },
    InMap { map: MapNum },
    HasItem { item: Id },
    MissingItem { item: Id },
    FlagSet { flag: String },
    FlagClear { flag: String },
    EntersWarp { to: Option<MapNum> },
    CrossesEdge { edge: EdgeDef },
    Always,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleEffectDef {
    PassThrough,
    Substitute { action: ActionDef },
    ForcedSequence { actions: Vec<ActionDef> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionDef {
    Walk(DirectionDef),
    Interact,
    Cancel,
    Menu,
    Noop,
}
