//! Bracket geometry
//!
//! One column per round, drawn left to right. First-round boxes are stacked
//! with a fixed gap; every later box is centred on its two feeders. Connector
//! lines run from a feeder's right edge to the middle of the column gap, then
//! vertically, then into the target's left edge.

use serde::{Deserialize, Serialize};

use super::generator::rounds_for_size;
use crate::error::Result;

const MIN_BOX_WIDTH: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    pub box_width: f64,
    pub box_height: f64,
    pub column_gap: f64,
    pub row_gap: f64,
    pub padding: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            box_width: 200.0,
            box_height: 56.0,
            column_gap: 48.0,
            row_gap: 12.0,
            padding: 24.0,
        }
    }
}

impl LayoutOptions {
    /// Shrink boxes so a bracket of `size` fits `available_width` pixels.
    /// Never goes below a readable minimum, nor above the default width.
    pub fn fit_width(size: usize, available_width: f64) -> Result<Self> {
        let rounds = rounds_for_size(size)? as f64;
        let defaults = Self::default();
        let usable = available_width - 2.0 * defaults.padding - (rounds - 1.0) * defaults.column_gap;
        let box_width = (usable / rounds).clamp(MIN_BOX_WIDTH, defaults.box_width);
        Ok(Self { box_width, ..defaults })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchupBox {
    pub round: usize,
    pub position: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MatchupBox {
    pub fn right_middle(&self) -> (f64, f64) {
        (self.x + self.width, self.y + self.height / 2.0)
    }

    pub fn left_middle(&self) -> (f64, f64) {
        (self.x, self.y + self.height / 2.0)
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorLine {
    /// Feeder matchup
    pub from: (usize, usize),
    /// Matchup the winner advances to
    pub to: (usize, usize),
    pub points: Vec<(f64, f64)>,
}

impl ConnectorLine {
    /// SVG `points` attribute.
    pub fn svg_points(&self) -> String {
        self.points
            .iter()
            .map(|(x, y)| format!("{:.1},{:.1}", x, y))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketLayout {
    pub width: f64,
    pub height: f64,
    pub options: LayoutOptions,
    /// Indexed by round, then position.
    pub boxes: Vec<Vec<MatchupBox>>,
    pub lines: Vec<ConnectorLine>,
}

impl BracketLayout {
    pub fn matchup_box(&self, round: usize, position: usize) -> Option<&MatchupBox> {
        self.boxes.get(round)?.get(position)
    }

    /// x of the left edge of a round's column.
    pub fn column_x(&self, round: usize) -> f64 {
        self.options.padding + round as f64 * (self.options.box_width + self.options.column_gap)
    }
}

pub fn compute_layout(size: usize, options: &LayoutOptions) -> Result<BracketLayout> {
    let rounds = rounds_for_size(size)?;
    let first_round = size / 2;

    let mut boxes: Vec<Vec<MatchupBox>> = Vec::with_capacity(rounds);
    for round in 0..rounds {
        let x = options.padding + round as f64 * (options.box_width + options.column_gap);
        let column: Vec<MatchupBox> = (0..(size >> (round + 1)))
            .map(|position| {
                let y = if round == 0 {
                    options.padding + position as f64 * (options.box_height + options.row_gap)
                } else {
                    let feeders = &boxes[round - 1];
                    let mid = (feeders[2 * position].center_y() + feeders[2 * position + 1].center_y()) / 2.0;
                    mid - options.box_height / 2.0
                };
                MatchupBox {
                    round,
                    position,
                    x,
                    y,
                    width: options.box_width,
                    height: options.box_height,
                }
            })
            .collect();
        boxes.push(column);
    }

    let mut lines = Vec::with_capacity(size.saturating_sub(2));
    for round in 1..rounds {
        for target in &boxes[round] {
            for feeder in &boxes[round - 1][2 * target.position..2 * target.position + 2] {
                lines.push(connector(feeder, target));
            }
        }
    }

    let width = 2.0 * options.padding
        + rounds as f64 * options.box_width
        + (rounds as f64 - 1.0) * options.column_gap;
    let height = 2.0 * options.padding
        + first_round as f64 * options.box_height
        + (first_round as f64 - 1.0) * options.row_gap;

    Ok(BracketLayout {
        width,
        height,
        options: *options,
        boxes,
        lines,
    })
}

fn connector(feeder: &MatchupBox, target: &MatchupBox) -> ConnectorLine {
    let (x1, y1) = feeder.right_middle();
    let (x2, y2) = target.left_middle();
    let elbow = (x1 + x2) / 2.0;
    ConnectorLine {
        from: (feeder.round, feeder.position),
        to: (target.round, target.position),
        points: vec![(x1, y1), (elbow, y1), (elbow, y2), (x2, y2)],
    }
}
