pub mod catalog;
pub mod params;
pub mod validation;

use serde::{Deserialize, Serialize};

use params::{
    AddWorksheetParams, CreateChartParams, CreateTableParams, EditCellParams, FormatRangeParams,
    FreezePanesParams,
};

// ── define_actions! macro ───────────────────────────────────────

/// Single source of truth for the action vocabulary. Generates:
/// 1. `Action` enum (serde-tagged on `type`, ts-rs exported)
/// 2. `ActionKind` (fieldless mirror with name/description lookups)
/// 3. `Action::kind()`
/// 4. `ActionKind::param_schema()` for the catalog
macro_rules! define_actions {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident ( $params:ty ) => $tag:literal : $desc:literal ;
        )*
    ) => {
        /// One atomic, executable spreadsheet instruction.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
        #[cfg_attr(feature = "ts-bindings", ts(export))]
        #[serde(tag = "type")]
        pub enum Action {
            $(
                $(#[$meta])*
                #[serde(rename = $tag)]
                $variant($params),
            )*
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
        #[cfg_attr(feature = "ts-bindings", ts(export))]
        pub enum ActionKind {
            $(
                #[serde(rename = $tag)]
                $variant,
            )*
        }

        impl ActionKind {
            pub fn all() -> &'static [ActionKind] {
                &[ $( ActionKind::$variant, )* ]
            }

            /// Wire name, as it appears in the `type` field.
            pub fn name(self) -> &'static str {
                match self {
                    $( ActionKind::$variant => $tag, )*
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $( ActionKind::$variant => $desc, )*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $tag => Some(ActionKind::$variant), )*
                    _ => None,
                }
            }

            pub(crate) fn param_schema(self) -> serde_json::Value {
                match self {
                    $( ActionKind::$variant => catalog::schema_value::<$params>(), )*
                }
            }
        }

        impl Action {
            pub fn kind(&self) -> ActionKind {
                match self {
                    $( Action::$variant(_) => ActionKind::$variant, )*
                }
            }
        }
    };
}

define_actions! {
    /// Write literal values or formulas into a range.
    EditCell(EditCellParams)
        => "editCell" : "Write values or formulas into a range. Omit address to write at the selection; a single-cell address anchors the grid's top-left corner.";
    /// Patch visual formatting on a range.
    FormatRange(FormatRangeParams)
        => "formatRange" : "Apply fill, font color, bold, italic, font size, number format, horizontal alignment or column width to a range. Only the given attributes change.";
    /// Convert a range into a structured table.
    CreateTable(CreateTableParams)
        => "createTable" : "Turn a range into a structured table. The first row is treated as headers unless hasHeaders is false.";
    /// Insert a chart driven by a data range.
    CreateChart(CreateChartParams)
        => "createChart" : "Insert a chart (ColumnClustered, Line, Pie or BarClustered) from a data range, with an optional title and series orientation.";
    /// Append a new sheet.
    AddWorksheet(AddWorksheetParams)
        => "addWorksheet" : "Append a new worksheet with the given name. The active sheet does not change.";
    /// Pin leading rows or columns of the active sheet.
    FreezePanes(FreezePanesParams)
        => "freezePanes" : "Freeze the first N rows or columns of the active sheet (count defaults to 1).";
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    /// The explicit target range, if the action names one.
    pub fn target(&self) -> Option<&str> {
        match self {
            Action::EditCell(p) => p.address.as_deref(),
            Action::FormatRange(p) => p.address.as_deref(),
            Action::CreateTable(p) => p.address.as_deref(),
            Action::CreateChart(p) => p.data_range.as_deref(),
            Action::AddWorksheet(_) | Action::FreezePanes(_) => None,
        }
    }
}

// ── Batch ───────────────────────────────────────────────────────

/// Ordered, validated actions from one reply. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActionBatch {
    actions: Vec<Action>,
}

impl ActionBatch {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }
}

impl<'a> IntoIterator for &'a ActionBatch {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl FromIterator<Action> for ActionBatch {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
