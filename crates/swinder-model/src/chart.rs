//! Chart objects decoded from chart substreams.
//!
//! A chart is stored as an arena of [`ChartObject`]s addressed by [`ChartObjectId`]; parent and
//! child links are indices into the same arena, so the tree has a single owner.

use serde::{Deserialize, Serialize};

pub type ChartObjectId = usize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartObjectKind {
    Chart,
    Series,
    Axis,
    AxisParent,
    Legend,
    Text,
    Frame,
    PlotArea,
    ChartFormat,
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
    Radar,
    Surface,
    DataFormat,
    /// Record id of a container the reader does not model.
    Other(u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartObject {
    pub kind: ChartObjectKind,
    pub parent: Option<ChartObjectId>,
    pub children: Vec<ChartObjectId>,
    /// Index into [`Chart::series`] for `Series` objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<usize>,
    /// Text carried by `Text` objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One data series.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories_formula: Option<String>,
    pub value_count: u16,
    pub category_count: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Position and size in points.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub objects: Vec<ChartObject>,
    pub series: Vec<Series>,
}

impl Chart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object under `parent`, returning its id.
    pub fn add_object(
        &mut self,
        kind: ChartObjectKind,
        parent: Option<ChartObjectId>,
    ) -> ChartObjectId {
        let id = self.objects.len();
        self.objects.push(ChartObject {
            kind,
            parent,
            children: Vec::new(),
            series: None,
            text: None,
        });
        if let Some(parent) = parent.and_then(|p| self.objects.get_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    pub fn object(&self, id: ChartObjectId) -> Option<&ChartObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ChartObjectId) -> Option<&mut ChartObject> {
        self.objects.get_mut(id)
    }

    /// Objects without a parent, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = ChartObjectId> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.parent.is_none())
            .map(|(i, _)| i)
    }
}
