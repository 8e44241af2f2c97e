//! Table rendering for retrieval results using comfy-table.
//!
//! | Output | Function |
//! |--------|----------|
//! | chunks of a context | `render_chunks_table()` |
//! | judge verdicts per hop | `render_evaluations_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use hoplite_core::{HopEvaluation, ScoredChunk};

use super::format::{preview, truncate_str};

/// Render the returned chunks.
///
/// # Example Output
///
/// ```text
/// #   HOP   SCORE   CHUNK   HEADER      TEXT
/// 1     0    1.00   OW1     Overwatch   Overwatch: a unit on overwatch may...
/// 2     1    0.98   D1      Dash        Dash: a model that dashes cannot...
/// ```
pub fn render_chunks_table(chunks: &[ScoredChunk], text_width: usize) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("#"),
        Cell::new("HOP").set_alignment(CellAlignment::Right),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("CHUNK"),
        Cell::new("HEADER"),
        Cell::new("TEXT"),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(2)), // #
        ColumnConstraint::LowerBoundary(Width::Fixed(3)), // HOP
        ColumnConstraint::LowerBoundary(Width::Fixed(5)), // SCORE
        ColumnConstraint::LowerBoundary(Width::Fixed(6)), // CHUNK
        ColumnConstraint::LowerBoundary(Width::Fixed(8)), // HEADER
    ]);

    for (i, chunk) in chunks.iter().enumerate() {
        let score = if chunk.relaxed {
            format!("{:.2}*", chunk.score)
        } else {
            format!("{:.2}", chunk.score)
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(chunk.hop_number).set_alignment(CellAlignment::Right),
            Cell::new(score).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(chunk.chunk_id().as_str(), 24)),
            Cell::new(truncate_str(&chunk.chunk.header, 28)),
            Cell::new(preview(&chunk.chunk.text, text_width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render one row per judge evaluation.
///
/// # Example Output
///
/// ```text
/// EVAL   ANSWER   FOLLOW-UP                  REASONING
/// 1      no       dash action restrictions   Dash limits are not covered
/// 2      yes      -                          Both rules are present
/// ```
pub fn render_evaluations_table(evaluations: &[HopEvaluation]) -> String {
    if evaluations.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("EVAL"),
        Cell::new("ANSWER"),
        Cell::new("FOLLOW-UP"),
        Cell::new("REASONING"),
    ]);

    for evaluation in evaluations {
        table.add_row(vec![
            Cell::new(evaluation.hop_number),
            Cell::new(if evaluation.can_answer { "yes" } else { "no" }),
            Cell::new(
                evaluation
                    .missing_query
                    .as_deref()
                    .map(|q| truncate_str(q, 40))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(preview(&evaluation.reasoning, 60)),
        ]);
    }

    table.trim_fmt().to_string()
}
