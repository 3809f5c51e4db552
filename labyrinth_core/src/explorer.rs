//! Per-agent exploration loop: right-hand wall following, stuck recovery and
//! routing to a locked door once a key is carried.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TeamConfig;
use crate::crawler::{CrawlError, Crawler};
use crate::inventory::{Inventory, InventoryError};
use crate::pathfinding::find_path;
use crate::shared_map::SharedMap;
use crate::tile::TileKind;
use crate::{Direction, Position};

#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    #[error(transparent)]
    Crawl(#[from] CrawlError),
    #[error("Failed to collect items: {0}")]
    Inventory(#[from] InventoryError),
}

/// How an exploration run ended. Running out of budget is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExploreOutcome {
    /// The crawler stood at `position` facing the outside.
    ExitFound { position: Position, ticks: u32 },
    Exhausted { ticks: u32 },
}

impl ExploreOutcome {
    pub fn found_exit(&self) -> bool {
        matches!(self, ExploreOutcome::ExitFound { .. })
    }

    pub fn ticks(&self) -> u32 {
        match self {
            ExploreOutcome::ExitFound { ticks, .. } | ExploreOutcome::Exhausted { ticks } => *ticks,
        }
    }
}

/// One agent of a team. Owns its crawler and its routing state; everything
/// it learns goes to the shared map.
pub struct Explorer<C> {
    id: usize,
    crawler: C,
    map: Arc<SharedMap>,
    stuck_threshold: u32,
    frontier_cap: usize,
    target_door: Option<Position>,
    path: VecDeque<Direction>,
    passed_doors: HashSet<Position>,
    /// Doors the current bag failed to open.
    refused_doors: HashSet<Position>,
    stuck_counter: u32,
    has_key: bool,
}

impl<C: Crawler> Explorer<C> {
    /// Creates an explorer with no target and an empty door history.
    ///
    /// # Arguments
    ///
    /// * `id`: Team index, which also decides the initial turn.
    /// * `crawler`: The body this explorer drives.
    /// * `map`: Map shared with the rest of the team.
    /// * `config`: Supplies the stuck threshold and the pathfinder frontier cap.
    pub fn new(id: usize, crawler: C, map: Arc<SharedMap>, config: &TeamConfig) -> Self {
        Self {
            id,
            crawler,
            map,
            stuck_threshold: config.stuck_threshold,
            frontier_cap: config.frontier_cap,
            target_door: None,
            path: VecDeque::new(),
            passed_doors: HashSet::new(),
            refused_doors: HashSet::new(),
            stuck_counter: 0,
            has_key: false,
        }
    }

    pub fn has_key(&self) -> bool {
        self.has_key
    }

    pub fn crawler(&self) -> &C {
        &self.crawler
    }

    /// Explores until the crawler faces the outside or `max_actions` ticks
    /// have been spent.
    ///
    /// Explorer `n` first turns right `n` times so a team fans out from a
    /// common start.
    pub async fn get_out(
        &mut self,
        max_actions: u32,
        bag: &mut Inventory,
    ) -> Result<ExploreOutcome, ExploreError> {
        for _ in 0..self.id % 4 {
            self.crawler.turn_right();
        }
        self.has_key = !bag.is_empty();

        for tick in 0..max_actions {
            if let Some(position) = self.tick(bag).await? {
                info!(explorer = self.id, %position, ticks = tick + 1, "exit found");
                return Ok(ExploreOutcome::ExitFound {
                    position,
                    ticks: tick + 1,
                });
            }
        }
        debug!(explorer = self.id, max_actions, "action budget exhausted");
        Ok(ExploreOutcome::Exhausted { ticks: max_actions })
    }

    /// Runs one tick. Returns the crawler position when it faces the outside.
    async fn tick(&mut self, bag: &mut Inventory) -> Result<Option<Position>, ExploreError> {
        let here = self.crawler.position();
        self.map.mark_visit(here);
        self.map.mark_discovered(here, TileKind::Room);

        let mut ahead = self.crawler.facing_tile().await?;
        self.map.mark_discovered(self.crawler.facing_position(), ahead);
        if ahead == TileKind::Outside {
            return Ok(Some(here));
        }

        if self.has_key && self.target_door.is_none() {
            self.choose_target(here);
        }

        let mut moved = false;
        if !self.path.is_empty() {
            moved = self.follow_path(bag).await?;
            if !moved {
                debug!(explorer = self.id, door = ?self.target_door, "path blocked, abandoning door");
                self.path.clear();
                self.target_door = None;
                // Following the path may have changed the heading.
                ahead = self.crawler.facing_tile().await?;
            }
        }
        if !moved {
            moved = self.follow_wall(bag, ahead).await?;
        }

        if moved {
            self.stuck_counter = 0;
        } else {
            self.stuck_counter += 1;
            if self.stuck_counter > self.stuck_threshold {
                debug!(explorer = self.id, position = %here, "stuck, turning around");
                self.crawler.turn_around();
                self.stuck_counter = 0;
            }
        }

        let facing = self.crawler.facing_tile().await?;
        self.map.mark_discovered(self.crawler.facing_position(), facing);
        Ok(None)
    }

    fn choose_target(&mut self, here: Position) {
        let refused = &self.refused_doors;
        let Some(door) = self
            .map
            .best_locked_door_where(here, |door| !refused.contains(door))
        else {
            return;
        };
        match find_path(&self.map, here, door, self.frontier_cap) {
            Some(path) if !path.is_empty() => {
                debug!(explorer = self.id, %door, steps = path.len(), "heading for locked door");
                self.target_door = Some(door);
                self.path = path.into();
            }
            _ => debug!(explorer = self.id, %door, "no known route to locked door"),
        }
    }

    async fn follow_path(&mut self, bag: &mut Inventory) -> Result<bool, ExploreError> {
        let Some(&next) = self.path.front() else {
            return Ok(false);
        };
        self.crawler.set_direction(next);
        let kind = self.crawler.facing_tile().await?;
        match kind {
            TileKind::Wall => return Ok(false),
            // Next tick reports the exit.
            TileKind::Outside => return Ok(true),
            TileKind::Room | TileKind::Door => {}
        }
        if !self.step(bag, kind).await? {
            if kind == TileKind::Door {
                self.door_refused(self.crawler.facing_position());
            }
            return Ok(false);
        }
        self.path.pop_front();
        if self.path.is_empty() {
            self.target_door = None;
        }
        Ok(true)
    }

    /// Right-hand rule: right if possible, else straight, else turn left.
    ///
    /// An exit is never walked onto. The crawler is left facing it, which
    /// counts as progress, and the next tick reports it from inside the maze.
    async fn follow_wall(
        &mut self,
        bag: &mut Inventory,
        ahead: TileKind,
    ) -> Result<bool, ExploreError> {
        self.crawler.turn_right();
        let right = self.crawler.facing_tile().await?;
        let right_position = self.crawler.facing_position();
        self.map.mark_discovered(right_position, right);
        if right == TileKind::Outside {
            return Ok(true);
        }
        if right != TileKind::Wall {
            if self.step(bag, right).await? {
                return Ok(true);
            }
            if right == TileKind::Door {
                self.door_refused(right_position);
            }
        }

        self.crawler.turn_left();
        let ahead_position = self.crawler.facing_position();
        match ahead {
            TileKind::Wall => {}
            TileKind::Door => {
                if self.step(bag, ahead).await? {
                    return Ok(true);
                }
                self.door_refused(ahead_position);
            }
            TileKind::Outside => return Ok(true),
            TileKind::Room => {
                if self.step(bag, ahead).await? {
                    return Ok(true);
                }
            }
        }
        self.crawler.turn_left();
        Ok(false)
    }

    /// Walks onto the facing tile of kind `kind`, then handles what the move
    /// revealed. Returns whether the crawler moved.
    async fn step(&mut self, bag: &mut Inventory, kind: TileKind) -> Result<bool, ExploreError> {
        let target = self.crawler.facing_position();
        let keys_before = bag.len();
        let Some(mut content) = self.crawler.try_walk(bag).await? else {
            return Ok(false);
        };
        let unlocked_here = bag.len() < keys_before;

        self.collect(bag, &mut content)?;
        self.map.mark_discovered(target, kind);
        if kind == TileKind::Door {
            self.map.remove_locked_door(target);
            if !unlocked_here && !self.passed_doors.contains(&target) {
                // Someone else opened it; leave their side to them.
                debug!(explorer = self.id, door = %target, "door already open, diverging");
                self.crawler.turn_around();
            }
            self.passed_doors.insert(target);
            self.has_key = !bag.is_empty();
        }
        Ok(true)
    }

    fn collect(&mut self, bag: &mut Inventory, content: &mut Inventory) -> Result<(), InventoryError> {
        if content.is_empty() {
            return Ok(());
        }
        let selector = vec![true; content.len()];
        let taken = bag.try_move_items_from(content, &selector)?;
        if taken > 0 {
            debug!(explorer = self.id, taken, "picked up keys");
            self.has_key = true;
            self.refused_doors.clear();
        }
        Ok(())
    }

    fn door_refused(&mut self, door: Position) {
        self.map.register_locked_door(door);
        self.refused_doors.insert(door);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::inventory::Key;
    use crate::keymaster::DoorId;
    use crate::labyrinth::{Labyrinth, LabyrinthCrawler};

    fn p(x: i32, y: i32) -> Position {
        Position::new(x, y)
    }

    fn explorer_on(layout: &str, id: usize) -> (Explorer<LabyrinthCrawler>, Arc<SharedMap>) {
        let labyrinth = Arc::new(Labyrinth::from_ascii(layout).unwrap());
        let map = Arc::new(SharedMap::new(labyrinth.start()));
        let crawler = labyrinth.new_crawler();
        let explorer = Explorer::new(id, crawler, Arc::clone(&map), &TeamConfig::default());
        (explorer, map)
    }

    #[tokio::test]
    async fn follows_corridor_to_exit() {
        let (mut explorer, map) = explorer_on("+---+\n x  |\n+---+", 0);
        let outcome = explorer.get_out(50, &mut Inventory::new()).await.unwrap();

        assert_eq!(
            outcome,
            ExploreOutcome::ExitFound {
                position: Position::new(0, 1),
                ticks: 8
            }
        );
        assert_eq!(
            map.tile_info(Position::new(-1, 1)).map(|t| t.kind),
            Some(TileKind::Outside)
        );
        assert_eq!(map.tile_info(Position::new(4, 1)).map(|t| t.kind), Some(TileKind::Wall));
    }

    #[tokio::test]
    async fn initial_rotation_spreads_explorers() {
        let (mut explorer, _) = explorer_on("+---+\n x  |\n+---+", 2);
        let outcome = explorer.get_out(50, &mut Inventory::new()).await.unwrap();
        // Facing South, the right-hand turn leads straight out West.
        assert_eq!(
            outcome,
            ExploreOutcome::ExitFound {
                position: Position::new(0, 1),
                ticks: 2
            }
        );
    }

    #[tokio::test]
    async fn fetches_key_and_routes_back_to_locked_door() {
        let (mut explorer, map) = explorer_on("+---+\n|k x/\n+---+", 0);
        let mut bag = Inventory::new();
        let outcome = explorer.get_out(50, &mut bag).await.unwrap();

        assert_eq!(
            outcome,
            ExploreOutcome::ExitFound {
                position: Position::new(4, 1),
                ticks: 7
            }
        );
        assert!(!map.is_door_locked(Position::new(4, 1)));
        assert!(bag.is_empty());
        assert!(!explorer.has_key());
        // Its own unlock does not turn it back.
        assert_eq!(explorer.crawler().direction(), Direction::East);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_reported() {
        let (mut explorer, map) = explorer_on("+-+\n|x|\n+-+", 0);
        let outcome = explorer.get_out(30, &mut Inventory::new()).await.unwrap();

        assert_eq!(outcome, ExploreOutcome::Exhausted { ticks: 30 });
        assert!(!outcome.found_exit());
        assert_eq!(map.visit_count(Position::new(1, 1)), 30);
        assert_eq!(explorer.crawler().position(), Position::new(1, 1));
    }

    #[tokio::test]
    async fn door_without_key_is_registered_locked() {
        let (mut explorer, map) = explorer_on("+---+\n|k/x|\n+---+", 0);
        let outcome = explorer.get_out(3, &mut Inventory::new()).await.unwrap();

        assert_eq!(outcome, ExploreOutcome::Exhausted { ticks: 3 });
        assert!(map.is_door_locked(Position::new(2, 1)));
        assert_eq!(
            map.tile_info(Position::new(2, 1)).map(|t| t.kind),
            Some(TileKind::Door)
        );
    }

    #[tokio::test]
    async fn exit_on_the_right_is_faced_not_entered() {
        let (mut explorer, map) = explorer_on("+-+\nx |\n+-+", 2);
        let outcome = explorer.get_out(10, &mut Inventory::new()).await.unwrap();

        assert_eq!(
            outcome,
            ExploreOutcome::ExitFound {
                position: p(0, 1),
                ticks: 2
            }
        );
        assert_eq!(explorer.crawler().position(), p(0, 1));
        assert_eq!(explorer.crawler().direction(), Direction::West);
        assert_eq!(map.tile_info(p(-1, 1)).map(|t| t.kind), Some(TileKind::Outside));
    }

    #[tokio::test]
    async fn stuck_explorer_turns_around_past_threshold() {
        let labyrinth = Arc::new(Labyrinth::from_ascii("+-+\n|x|\n+-+").unwrap());
        let map = Arc::new(SharedMap::new(labyrinth.start()));
        let config = TeamConfig {
            stuck_threshold: 2,
            ..TeamConfig::default()
        };
        let mut explorer = Explorer::new(0, labyrinth.new_crawler(), map, &config);
        let mut bag = Inventory::new();

        // Every unmoved tick ends one turn left of where it started.
        explorer.get_out(2, &mut bag).await.unwrap();
        assert_eq!(explorer.crawler().direction(), Direction::South);

        // The third unmoved tick would face East; recovery flips it.
        explorer.get_out(1, &mut bag).await.unwrap();
        assert_eq!(explorer.crawler().direction(), Direction::West);

        // The counter restarted, so the next tick is a plain left turn.
        explorer.get_out(1, &mut bag).await.unwrap();
        assert_eq!(explorer.crawler().direction(), Direction::South);
        assert_eq!(explorer.crawler().position(), p(1, 1));
    }

    /// Records where each successful walk landed and the heading it took.
    struct Recording {
        inner: LabyrinthCrawler,
        walks: Vec<(Position, Direction)>,
    }

    impl Recording {
        fn new(inner: LabyrinthCrawler) -> Self {
            Self {
                inner,
                walks: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Crawler for Recording {
        fn position(&self) -> Position {
            self.inner.position()
        }

        fn direction(&self) -> Direction {
            self.inner.direction()
        }

        fn set_direction(&mut self, direction: Direction) {
            self.inner.set_direction(direction);
        }

        async fn facing_tile(&self) -> Result<TileKind, CrawlError> {
            self.inner.facing_tile().await
        }

        async fn try_walk(&mut self, bag: &mut Inventory) -> Result<Option<Inventory>, CrawlError> {
            let heading = self.inner.direction();
            let content = self.inner.try_walk(bag).await?;
            if content.is_some() {
                self.walks.push((self.inner.position(), heading));
            }
            Ok(content)
        }
    }

    #[tokio::test]
    async fn door_opened_by_someone_else_turns_explorer_back_once() {
        let labyrinth = Arc::new(Labyrinth::from_ascii("+-----+\n|k x/ |\n+-----+").unwrap());

        // A teammate fetches the key and opens the door.
        let mut other = labyrinth.new_crawler();
        let mut other_bag = Inventory::new();
        other.set_direction(Direction::West);
        other.try_walk(&mut other_bag).await.unwrap().unwrap();
        let mut key_room = other.try_walk(&mut other_bag).await.unwrap().unwrap();
        other_bag.move_first(&mut key_room).unwrap();
        other.set_direction(Direction::East);
        for _ in 0..3 {
            other.try_walk(&mut other_bag).await.unwrap().unwrap();
        }
        assert_eq!(other.position(), p(4, 1));
        assert!(other_bag.is_empty());

        let map = Arc::new(SharedMap::new(labyrinth.start()));
        let mut crawler = Recording::new(labyrinth.new_crawler());
        crawler.set_direction(Direction::East);
        let mut explorer = Explorer::new(0, crawler, Arc::clone(&map), &TeamConfig::default());
        let mut bag = Inventory::new();

        explorer.get_out(1, &mut bag).await.unwrap();
        assert_eq!(explorer.crawler().position(), p(4, 1));
        assert_eq!(explorer.crawler().direction(), Direction::West);

        // Back along the corridor to the west wall and round to the door again.
        explorer.get_out(8, &mut bag).await.unwrap();
        assert_eq!(
            explorer.crawler().walks,
            vec![
                (p(4, 1), Direction::East),
                (p(3, 1), Direction::West),
                (p(2, 1), Direction::West),
                (p(1, 1), Direction::West),
                (p(2, 1), Direction::East),
                (p(3, 1), Direction::East),
                (p(4, 1), Direction::East),
            ]
        );
        // Second pass: no turn.
        assert_eq!(explorer.crawler().direction(), Direction::East);
        assert!(!map.is_door_locked(p(4, 1)));
    }

    #[tokio::test]
    async fn blocked_path_falls_back_to_wall_following_in_the_same_tick() {
        let labyrinth = Arc::new(Labyrinth::from_ascii("+---+\n|x/k|\n+---+").unwrap());
        let map = Arc::new(SharedMap::new(labyrinth.start()));
        // Stale knowledge: a room north of the start leading to a locked door.
        map.mark_discovered(p(1, 0), TileKind::Room);
        map.mark_discovered(p(1, -1), TileKind::Door);
        map.register_locked_door(p(1, -1));

        let mut crawler = labyrinth.new_crawler();
        crawler.set_direction(Direction::East);
        let mut explorer = Explorer::new(0, crawler, Arc::clone(&map), &TeamConfig::default());
        let mut bag = Inventory::with_key(Key::new(DoorId(99)));

        explorer.get_out(1, &mut bag).await.unwrap();

        assert!(explorer.has_key());
        // The path step north hit a wall. Wall following then ran from the
        // northward heading: the door to the right refused the key and the
        // wall ahead was not mistaken for the door first faced.
        assert_eq!(map.locked_doors(), vec![p(1, -1), p(2, 1)]);
        assert!(!map.is_door_locked(p(1, 0)));
        assert_eq!(explorer.crawler().direction(), Direction::West);
        assert_eq!(explorer.crawler().position(), p(1, 1));
        assert_eq!(bag.len(), 1);
    }

    #[tokio::test]
    async fn refused_door_is_skipped_until_a_new_item_is_found() {
        let labyrinth = Arc::new(Labyrinth::from_ascii("+-----+\n|k x/ |\n+-----+").unwrap());
        let map = Arc::new(SharedMap::new(labyrinth.start()));
        map.mark_discovered(p(4, 1), TileKind::Door);
        map.register_locked_door(p(4, 1));

        let mut crawler = labyrinth.new_crawler();
        crawler.set_direction(Direction::East);
        let mut explorer = Explorer::new(0, crawler, Arc::clone(&map), &TeamConfig::default());
        let mut bag = Inventory::with_key(Key::new(DoorId(99)));

        // The wrong key is refused on the first tick. On the second the door
        // is no longer a target, so wall following turns the explorer west
        // instead of retrying east.
        explorer.get_out(2, &mut bag).await.unwrap();
        assert_eq!(explorer.crawler().position(), p(3, 1));
        assert_eq!(explorer.crawler().direction(), Direction::West);
        assert!(map.is_door_locked(p(4, 1)));

        // Picking up the real key makes the door a target again.
        explorer.get_out(5, &mut bag).await.unwrap();
        assert_eq!(explorer.crawler().position(), p(4, 1));
        assert_eq!(explorer.crawler().direction(), Direction::East);
        assert!(!map.is_door_locked(p(4, 1)));
        assert_eq!(bag.items(), &[Key::new(DoorId(99))]);
        assert!(explorer.has_key());
    }

    struct BrokenCrawler;

    #[async_trait]
    impl Crawler for BrokenCrawler {
        fn position(&self) -> Position {
            Position::new(0, 0)
        }

        fn direction(&self) -> Direction {
            Direction::North
        }

        fn set_direction(&mut self, _direction: Direction) {}

        async fn facing_tile(&self) -> Result<TileKind, CrawlError> {
            Err(CrawlError::Substrate("connection reset".into()))
        }

        async fn try_walk(&mut self, _bag: &mut Inventory) -> Result<Option<Inventory>, CrawlError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn crawl_failures_propagate() {
        let map = Arc::new(SharedMap::new(Position::new(0, 0)));
        let mut explorer = Explorer::new(0, BrokenCrawler, map, &TeamConfig::default());
        let err = explorer.get_out(10, &mut Inventory::new()).await.unwrap_err();
        assert!(matches!(err, ExploreError::Crawl(CrawlError::Substrate(_))));
    }
}
