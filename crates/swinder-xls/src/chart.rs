//! Chart substream handler.
//!
//! Objects are collected into the [`Chart`] arena. BEGIN pushes the most recently created object
//! on a stack and END pops it, so every object created in between gets the top of the stack as
//! its parent.

use swinder_model::{Chart, ChartObjectId, ChartObjectKind, Series, Workbook};

use crate::biff::formula::{decode_formula, CellBase};
use crate::biff::parsers::chart::{Ai, AiTarget, AI_REFERENCE_WORKSHEET};
use crate::biff::registry::Record;
use crate::globals::Globals;
use crate::warnings::Warnings;

#[derive(Debug)]
pub(crate) struct ChartHandler {
    /// Sheet that receives the chart at EOF.
    sheet: Option<usize>,
    chart: Chart,
    /// Open BEGIN blocks. `None` marks a BEGIN that had no object to open.
    stack: Vec<Option<ChartObjectId>>,
    last_created: Option<ChartObjectId>,
    current_series: Option<usize>,
}

impl ChartHandler {
    pub(crate) fn new(sheet: Option<usize>) -> Self {
        Self {
            sheet,
            chart: Chart::new(),
            stack: Vec::new(),
            last_created: None,
            current_series: None,
        }
    }

    fn parent(&self) -> Option<ChartObjectId> {
        self.stack.last().copied().flatten()
    }

    fn create(&mut self, kind: ChartObjectKind) -> ChartObjectId {
        let id = self.chart.add_object(kind, self.parent());
        self.last_created = Some(id);
        id
    }

    pub(crate) fn handle(&mut self, record: Record, globals: &Globals, warnings: &mut Warnings) {
        match record {
            Record::Bof(_) | Record::Eof => {}
            Record::Chart(rect) => {
                self.chart.x = rect.x;
                self.chart.y = rect.y;
                self.chart.width = rect.width;
                self.chart.height = rect.height;
                self.create(ChartObjectKind::Chart);
            }
            Record::Begin => self.stack.push(self.last_created),
            Record::End => {
                if self.stack.pop().is_none() {
                    log::debug!("chart END without a matching BEGIN");
                }
            }
            Record::Series(counts) => {
                let index = self.chart.series.len();
                self.chart.series.push(Series {
                    value_count: counts.value_count,
                    category_count: counts.category_count,
                    ..Series::default()
                });
                let id = self.create(ChartObjectKind::Series);
                if let Some(object) = self.chart.object_mut(id) {
                    object.series = Some(index);
                }
                self.current_series = Some(index);
            }
            Record::ChartContainer(kind) => {
                self.create(kind);
            }
            Record::SeriesText(text) => self.series_text(text),
            Record::Ai(ai) => self.ai(ai, globals, warnings),
            Record::Malformed { id, reason } => {
                warnings.push(format!("malformed chart record 0x{id:04X}: {reason}"));
            }
            other => log::debug!("chart substream ignores {other:?}"),
        }
    }

    /// SERIESTEXT names the open TEXT object when there is one, otherwise the current series.
    fn series_text(&mut self, text: String) {
        if let Some(object) = self.parent().and_then(|id| self.chart.object_mut(id)) {
            if object.kind == ChartObjectKind::Text {
                object.text = Some(text);
                return;
            }
        }
        match self.current_series.and_then(|i| self.chart.series.get_mut(i)) {
            Some(series) => series.name = Some(text),
            None => log::debug!("SERIESTEXT outside a series: {text:?}"),
        }
    }

    fn ai(&mut self, ai: Ai, globals: &Globals, warnings: &mut Warnings) {
        if ai.reference_type != AI_REFERENCE_WORKSHEET || ai.formula.rgce.is_empty() {
            return;
        }
        let Some(series) = self.current_series.and_then(|i| self.chart.series.get_mut(i)) else {
            log::debug!("AI record outside a series");
            return;
        };
        let decoded = decode_formula(
            &ai.formula,
            CellBase::default(),
            globals.decode_context(),
            globals,
        );
        for warning in decoded.warnings {
            warnings.push(format!("chart series formula: {warning}"));
        }
        let slot = match ai.target {
            AiTarget::SeriesName => &mut series.name_formula,
            AiTarget::Values => &mut series.values_formula,
            AiTarget::Categories => &mut series.categories_formula,
            AiTarget::BubbleSizes | AiTarget::Other(_) => return,
        };
        *slot = Some(decoded.text);
    }

    /// Attach the chart to its sheet.
    pub(crate) fn finish(self, workbook: &mut Workbook, warnings: &mut Warnings) {
        match self.sheet.and_then(|i| workbook.sheets.get_mut(i)) {
            Some(sheet) => sheet.charts.push(self.chart),
            None => warnings.push("chart substream has no owning sheet; chart dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::parsers::chart::{ChartRect, SeriesCounts};
    use crate::biff::parsers::FormulaBytes;
    use crate::biff::BiffVersion;
    use pretty_assertions::assert_eq;
    use swinder_model::Sheet;

    fn area3d(ixti: u16, rows: (u16, u16), column: u16) -> FormulaBytes {
        let mut rgce = vec![0x3B];
        for v in [ixti, rows.0, rows.1, column, column] {
            rgce.extend_from_slice(&v.to_le_bytes());
        }
        FormulaBytes {
            rgce,
            rgcb: Vec::new(),
        }
    }

    #[test]
    fn builds_object_tree_and_series() {
        let globals = Globals::new(BiffVersion::Biff8);
        let mut warnings = Warnings::new(10);
        let mut handler = ChartHandler::new(Some(0));

        let records = vec![
            Record::Chart(ChartRect {
                x: 0.0,
                y: 0.0,
                width: 200.0,
                height: 100.0,
            }),
            Record::Begin,
            Record::Series(SeriesCounts {
                category_count: 3,
                value_count: 3,
            }),
            Record::Begin,
            Record::Ai(Ai {
                target: AiTarget::Values,
                reference_type: AI_REFERENCE_WORKSHEET,
                formula: area3d(0, (0, 2), 1),
            }),
            Record::SeriesText("Sales".to_string()),
            Record::End,
            Record::ChartContainer(ChartObjectKind::Text),
            Record::Begin,
            Record::SeriesText("Title".to_string()),
            Record::End,
            Record::End,
        ];
        for record in records {
            handler.handle(record, &globals, &mut warnings);
        }

        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("Data"));
        handler.finish(&mut workbook, &mut warnings);

        let chart = &workbook.sheets[0].charts[0];
        assert_eq!(chart.width, 200.0);
        assert_eq!(chart.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(chart.objects[0].children, vec![1, 2]);
        assert_eq!(chart.objects[1].series, Some(0));
        assert_eq!(chart.objects[2].text.as_deref(), Some("Title"));

        let series = &chart.series[0];
        assert_eq!(series.name.as_deref(), Some("Sales"));
        // No EXTERNSHEET table, so the sheet prefix degrades.
        assert_eq!(series.values_formula.as_deref(), Some("Error!$B$1:$B$3"));
        assert_eq!(series.value_count, 3);
    }

    #[test]
    fn chart_without_sheet_is_dropped_with_warning() {
        let mut warnings = Warnings::new(10);
        let mut workbook = Workbook::new();
        ChartHandler::new(None).finish(&mut workbook, &mut warnings);
        assert_eq!(warnings.len(), 1);
    }
}
