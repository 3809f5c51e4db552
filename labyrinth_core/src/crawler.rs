//! The crawl capability an explorer drives.
//!
//! Querying and walking are the only calls that cross the agent/maze
//! boundary, so they are the only suspension points of an exploration
//! tick. A remote crawl substrate may take arbitrarily long to answer.

use async_trait::async_trait;

use crate::inventory::Inventory;
use crate::tile::TileKind;
use crate::{Direction, Position};

/// Failures of the crawl substrate itself. Bumping into a wall or a locked
/// door is not one of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrawlError {
    #[error("Crawl substrate error: {0}")]
    Substrate(String),
}

#[async_trait]
pub trait Crawler: Send + Sync {
    fn position(&self) -> Position;

    fn direction(&self) -> Direction;

    /// Changes the heading. Turning never crosses the maze boundary.
    fn set_direction(&mut self, direction: Direction);

    /// Kind of the tile directly in front of the crawler.
    async fn facing_tile(&self) -> Result<TileKind, CrawlError>;

    /// Tries to step onto the facing tile, opening a door with `bag` first
    /// if one is in the way.
    ///
    /// Returns the content revealed by the entered cell, or `None` when the
    /// move was blocked and the position did not change.
    async fn try_walk(&mut self, bag: &mut Inventory) -> Result<Option<Inventory>, CrawlError>;

    fn turn_left(&mut self) {
        self.set_direction(self.direction().turn_left());
    }

    fn turn_right(&mut self) {
        self.set_direction(self.direction().turn_right());
    }

    fn turn_around(&mut self) {
        self.set_direction(self.direction().opposite());
    }

    /// Position of the tile the crawler faces.
    fn facing_position(&self) -> Position {
        self.position().step(self.direction())
    }
}
