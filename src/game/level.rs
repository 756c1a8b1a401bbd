//! Level Geometry
//!
//! A rectangular tile grid with per-tile kind and design label. Level
//! generation lives outside this crate; the grid only needs start/end lookup
//! and a stable serialized form.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::point::{Coordinate, Point};

/// What a tile is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Walkable
    Floor,
    /// Blocks movement
    Wall,
    /// Reaching it ends the level
    Exit,
    /// Walkable passage between rooms
    Door,
    /// Falls out of the level
    Hole,
    /// Outside the playable area
    Skip,
}

impl TileKind {
    /// Whether heroes can stand on it.
    pub const fn is_accessible(self) -> bool {
        matches!(self, TileKind::Floor | TileKind::Exit | TileKind::Door)
    }

    fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' | 'S' => Some(TileKind::Floor),
            '#' => Some(TileKind::Wall),
            'E' => Some(TileKind::Exit),
            'D' => Some(TileKind::Door),
            'O' => Some(TileKind::Hole),
            ' ' | '_' => Some(TileKind::Skip),
            _ => None,
        }
    }
}

/// Texture theme of a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DesignLabel {
    /// Stone dungeon
    #[default]
    Default,
    /// Lava caves
    Fire,
    /// Overgrown ruins
    Forest,
    /// Frozen halls
    Ice,
    /// Temple interior
    Temple,
    /// Unlit crypt
    Dark,
}

/// A single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile kind
    pub kind: TileKind,
    /// Texture theme
    pub label: DesignLabel,
    /// Grid address
    pub coordinate: Coordinate,
}

/// Layout parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    /// No rows
    #[error("level layout is empty")]
    Empty,

    /// Rows of differing width
    #[error("row {row} has width {width}, expected {expected}")]
    Ragged {
        /// Offending row
        row: usize,
        /// Its width
        width: usize,
        /// Width of the first row
        expected: usize,
    },

    /// Glyph with no tile meaning
    #[error("unknown tile glyph {glyph:?} at {x},{y}")]
    UnknownGlyph {
        /// The glyph
        glyph: char,
        /// Column
        x: usize,
        /// Row
        y: usize,
    },

    /// Nowhere to spawn
    #[error("level has no accessible tile")]
    NoStartTile,

    /// Tile count disagrees with the declared dimensions
    #[error("level declares {width}x{height} but carries {tiles} tiles")]
    Dimensions {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
        /// Tiles present
        tiles: usize,
    },
}

/// Level geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LevelData")]
pub struct Level {
    width: u32,
    height: u32,
    /// Row-major, `y * width + x`
    tiles: Vec<Tile>,
    start: Coordinate,
}

/// Unchecked serialized form, validated into a [`Level`].
#[derive(Deserialize)]
struct LevelData {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    start: Coordinate,
}

impl TryFrom<LevelData> for Level {
    type Error = LevelError;

    fn try_from(data: LevelData) -> Result<Self, Self::Error> {
        let expected = (data.width as usize).checked_mul(data.height as usize);
        if expected != Some(data.tiles.len()) {
            return Err(LevelError::Dimensions {
                width: data.width,
                height: data.height,
                tiles: data.tiles.len(),
            });
        }
        Ok(Self {
            width: data.width,
            height: data.height,
            tiles: data.tiles,
            start: data.start,
        })
    }
}

impl Level {
    /// Parse a text layout, one row per line, top row is y = 0.
    ///
    /// Glyphs: `.` floor, `S` floor and start, `#` wall, `E` exit, `D` door,
    /// `O` hole, space or `_` skip. Without an `S` the first accessible tile
    /// is the start.
    pub fn from_layout(layout: &str, label: DesignLabel) -> Result<Self, LevelError> {
        let rows: Vec<&str> = layout.lines().filter(|l| !l.is_empty()).collect();
        let expected = rows.first().map(|r| r.chars().count()).ok_or(LevelError::Empty)?;
        if expected == 0 {
            return Err(LevelError::Empty);
        }

        let mut tiles = Vec::with_capacity(expected * rows.len());
        let mut start = None;

        for (y, row) in rows.iter().enumerate() {
            let width = row.chars().count();
            if width != expected {
                return Err(LevelError::Ragged { row: y, width, expected });
            }
            for (x, glyph) in row.chars().enumerate() {
                let kind = TileKind::from_glyph(glyph)
                    .ok_or(LevelError::UnknownGlyph { glyph, x, y })?;
                let coordinate = Coordinate::new(x as i32, y as i32);
                if glyph == 'S' {
                    start = Some(coordinate);
                }
                tiles.push(Tile { kind, label, coordinate });
            }
        }

        let start = match start {
            Some(c) => c,
            None => tiles
                .iter()
                .find(|t| t.kind == TileKind::Floor)
                .map(|t| t.coordinate)
                .ok_or(LevelError::NoStartTile)?,
        };

        Ok(Self {
            width: expected as u32,
            height: rows.len() as u32,
            tiles,
            start,
        })
    }

    /// Grid width in tiles.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All tiles, row-major.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Tile at a grid address.
    pub fn tile_at(&self, coordinate: Coordinate) -> Option<&Tile> {
        if coordinate.x < 0 || coordinate.y < 0 {
            return None;
        }
        let (x, y) = (coordinate.x as usize, coordinate.y as usize);
        if x >= self.width as usize || y >= self.height as usize {
            return None;
        }
        let index = y.checked_mul(self.width as usize)?.checked_add(x)?;
        self.tiles.get(index)
    }

    /// Tile under a world position.
    pub fn tile_at_point(&self, point: Point) -> Option<&Tile> {
        self.tile_at(point.to_coordinate())
    }

    /// Spawn tile.
    pub fn start_tile(&self) -> Option<&Tile> {
        self.tile_at(self.start)
    }

    /// First exit tile, if the level has one.
    pub fn end_tile(&self) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.kind == TileKind::Exit)
    }

    /// Whether a world position is on the exit.
    pub fn is_on_end_tile(&self, point: Point) -> bool {
        matches!(self.tile_at_point(point), Some(t) if t.kind == TileKind::Exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "\
#####
#S..#
#..E#
#####";

    #[test]
    fn test_layout_dimensions() {
        let level = Level::from_layout(ROOM, DesignLabel::Fire).unwrap();
        assert_eq!(level.width(), 5);
        assert_eq!(level.height(), 4);
        assert_eq!(level.tiles().len(), 20);
        assert!(level.tiles().iter().all(|t| t.label == DesignLabel::Fire));
    }

    #[test]
    fn test_start_and_end_tiles() {
        let level = Level::from_layout(ROOM, DesignLabel::Default).unwrap();
        assert_eq!(level.start_tile().map(|t| t.coordinate), Some(Coordinate::new(1, 1)));
        assert_eq!(level.end_tile().map(|t| t.coordinate), Some(Coordinate::new(3, 2)));
        assert!(level.is_on_end_tile(Point::new(3.4, 2.9)));
        assert!(!level.is_on_end_tile(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_start_defaults_to_first_floor() {
        let level = Level::from_layout("#..\n#.E", DesignLabel::Default).unwrap();
        assert_eq!(level.start_tile().map(|t| t.coordinate), Some(Coordinate::new(1, 0)));
    }

    #[test]
    fn test_tile_at_out_of_bounds() {
        let level = Level::from_layout(ROOM, DesignLabel::Default).unwrap();
        assert!(level.tile_at(Coordinate::new(-1, 0)).is_none());
        assert!(level.tile_at(Coordinate::new(5, 0)).is_none());
        assert_eq!(level.tile_at(Coordinate::new(0, 0)).map(|t| t.kind), Some(TileKind::Wall));
    }

    #[test]
    fn test_decoded_dimensions_must_match_tiles() {
        let level = Level::from_layout(ROOM, DesignLabel::Default).unwrap();
        let json = serde_json::to_string(&level).unwrap();
        assert_eq!(serde_json::from_str::<Level>(&json).unwrap(), level);

        let inflated = json.replacen("\"width\":5", "\"width\":4294967295", 1);
        let err = serde_json::from_str::<Level>(&inflated).unwrap_err();
        assert!(err.to_string().contains("4294967295x4"));
    }

    #[test]
    fn test_layout_errors() {
        assert_eq!(Level::from_layout("", DesignLabel::Default), Err(LevelError::Empty));
        assert!(matches!(
            Level::from_layout("..\n...", DesignLabel::Default),
            Err(LevelError::Ragged { row: 1, .. })
        ));
        assert!(matches!(
            Level::from_layout(".x", DesignLabel::Default),
            Err(LevelError::UnknownGlyph { glyph: 'x', .. })
        ));
        assert_eq!(Level::from_layout("##", DesignLabel::Default), Err(LevelError::NoStartTile));
    }
}
