//! Square grid of tiles.

use catmouse_core::{Direction, Error, Occupant, Position, Result, MAX_MAP_SIZE, MIN_MAP_SIZE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub position: Position,
    occupant: Option<Occupant>,
}

impl Tile {
    fn new(position: Position) -> Self {
        Self {
            position,
            occupant: None,
        }
    }

    pub fn occupant(&self) -> Option<Occupant> {
        self.occupant
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// A bounded N×N grid. Tiles are stored row-major starting at (0, 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    size: i32,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Build an empty grid; `size` is clamped to the supported range
    pub fn new(size: i32) -> Self {
        let size = size.clamp(MIN_MAP_SIZE, MAX_MAP_SIZE);
        let tiles = (0..size * size)
            .map(|i| Tile::new(Position::new(i % size, i / size)))
            .collect();

        Self { size, tiles }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.size && pos.y >= 0 && pos.y < self.size
    }

    pub fn get(&self, pos: Position) -> Option<&Tile> {
        self.index_of(pos).map(|index| &self.tiles[index])
    }

    pub fn occupant_at(&self, pos: Position) -> Option<Occupant> {
        self.get(pos).and_then(Tile::occupant)
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.get(pos).map_or(false, Tile::is_empty)
    }

    /// Neighbours in North, South, West, East order. Off-grid ones are skipped.
    pub fn adjacent_tiles(&self, pos: Position) -> Vec<Tile> {
        Direction::all()
            .iter()
            .filter_map(|&direction| self.get(pos.step(direction)).copied())
            .collect()
    }

    pub fn adjacent_empty_tiles(&self, pos: Position) -> Vec<Tile> {
        self.adjacent_tiles(pos)
            .into_iter()
            .filter(Tile::is_empty)
            .collect()
    }

    /// Pick an empty tile uniformly at random.
    ///
    /// Walks a lazily shuffled permutation of the tile indices, so it draws
    /// without replacement, terminates after at most `size²` draws and returns
    /// `None` only when the grid is full. Only the swapped slots are stored.
    pub fn random_empty_tile<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        let len = self.tiles.len();
        let mut swapped: HashMap<usize, usize> = HashMap::new();

        for i in 0..len {
            let j = rng.gen_range(i..len);
            let picked = swapped.get(&j).copied().unwrap_or(j);
            let displaced = swapped.get(&i).copied().unwrap_or(i);
            swapped.insert(j, displaced);

            let tile = &self.tiles[picked];
            if tile.is_empty() {
                return Some(tile.position);
            }
        }

        None
    }

    /// Empty the tile, returning whoever stood there
    pub fn clear(&mut self, pos: Position) -> Option<Occupant> {
        self.index_of(pos)
            .and_then(|index| self.tiles[index].occupant.take())
    }

    /// Put an animal on an empty tile
    pub fn place(&mut self, occupant: Occupant, pos: Position) -> Result<()> {
        let index = self.index_of(pos).ok_or(Error::OutOfBounds(pos))?;
        let tile = &mut self.tiles[index];
        if tile.occupant.is_some() {
            return Err(Error::Occupied(pos));
        }
        tile.occupant = Some(occupant);
        Ok(())
    }

    pub fn occupied_count(&self) -> usize {
        self.tiles.iter().filter(|tile| !tile.is_empty()).count()
    }

    pub fn empty_count(&self) -> usize {
        self.tiles.len() - self.occupied_count()
    }

    /// Iterator over all tiles, row by row
    pub fn iter(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter()
    }

    fn index_of(&self, pos: Position) -> Option<usize> {
        if self.contains(pos) {
            Some((pos.y * self.size + pos.x) as usize)
        } else {
            None
        }
    }
}

/// ASCII view, north row first
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.size).rev() {
            for x in 0..self.size {
                let glyph = self
                    .occupant_at(Position::new(x, y))
                    .map_or('.', |o| o.species.glyph());
                write!(f, "{}", glyph)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
