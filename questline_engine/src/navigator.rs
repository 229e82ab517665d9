//! navigator.rs -- route following
//!
//! The navigator turns "keep following the route" into one concrete move per
//! step. It owns a cursor into the active route segment:
//!
//! - the segment for the current map replaces the active route whenever the
//!   active quest has one; otherwise the last active route of that quest is
//!   kept and the navigator steers toward a warp leading to its map
//! - the cursor snaps to the nearest route point when it is unset or the agent
//!   has drifted more than `snap_radius` tiles from it
//! - standing on the cursor's point advances it once; past the last point the
//!   navigator moves on to the quest's next segment (through a warp), or yields
//!   `RouteComplete` until the agent wanders off or the route changes
//! - a segment handed over to stays active until the agent changes map, even
//!   though the quest still has a segment on the map being left
//!
//! Moves come from the local A* search when a viewport is available, or from
//! the greedy larger-axis rule otherwise.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;
use crate::atlas::Atlas;
use crate::config::EngineConfig;
use crate::coords::{Direction, GlobalCoord, MapId, UnknownMapError};
use crate::grid::{Pathfinder, Viewport};
use crate::route::{RouteKey, RouteSegment, RouteStore, nearest_point};

/// Reasons the navigator declined to produce a move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error(transparent)]
    UnknownMap(#[from] UnknownMapError),
    #[error("quest {quest} has no route on {map}")]
    NoRouteForMap { quest: String, map: MapId },
    #[error("route for quest {quest} on {map} is complete")]
    RouteComplete { quest: String, map: MapId },
    #[error("no path from {from}{}", describe_target(.toward))]
    PathNotFound { from: GlobalCoord, toward: Option<GlobalCoord> },
}

/// Per-session navigation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatorState {
    pub active_route: Option<RouteKey>,
    /// Index of the next route point to reach. Equal to the route length once exhausted.
    pub cursor: Option<usize>,
    pub last_known_position: Option<GlobalCoord>,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    state: NavigatorState,
    snap_radius: u32,
    local_pathfinding: bool,
}

impl Navigator {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_state(NavigatorState::default(), config)
    }

    pub fn with_state(state: NavigatorState, config: &EngineConfig) -> Self {
        Self {
            state,
            snap_radius: config.snap_radius,
            local_pathfinding: config.use_local_pathfinding,
        }
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    /// Load a new active route with the cursor on its first point, or clear it.
    pub fn reset_route(&mut self, route: Option<&RouteSegment>) {
        match route {
            Some(route) => {
                info!(
                    "navigator: route set to quest {} on {} ({} points)",
                    route.key().quest,
                    route.map(),
                    route.len()
                );
                self.state.active_route = Some(route.key().clone());
                self.state.cursor = Some(0);
            },
            None => {
                debug!("navigator: route cleared");
                self.state.active_route = None;
                self.state.cursor = None;
            },
        }
    }

    /// Record a reported position. On a map change, switch to the quest's
    /// segment for the new map (if any) and snap onto it.
    pub fn observe(&mut self, routes: &RouteStore, quest: &str, position: GlobalCoord) {
        let changed_map = self
            .state
            .last_known_position
            .is_some_and(|last| last.map != position.map);
        self.state.last_known_position = Some(position);
        if !changed_map {
            return;
        }
        if let Some(route) = routes.find_route_for(quest, position.map) {
            let cursor = nearest_point(route, &position);
            info!("navigator: arrived on {}, snapped to point {cursor:?}", position.map);
            self.state.active_route = Some(route.key().clone());
            self.state.cursor = cursor;
        } else {
            debug!("navigator: arrived on {}, no segment for quest {quest}", position.map);
        }
    }

    /// The next move toward the active quest's objective.
    ///
    /// # Errors
    /// - `UnknownMap` if `position` is on a map the atlas does not know
    /// - `NoRouteForMap` if the quest has no route here and none is active
    /// - `RouteComplete` once the cursor has passed the last route point
    /// - `PathNotFound` if no warp or local path leads toward the target
    pub fn next_action(
        &mut self,
        atlas: &Atlas,
        quest: &str,
        position: GlobalCoord,
        viewport: Option<&Viewport>,
    ) -> Result<Action, NavError> {
        atlas.maps.info(position.map)?;
        let arrived = !self
            .state
            .last_known_position
            .is_some_and(|last| last.map == position.map);
        self.state.last_known_position = Some(position);

        let route = self.resolve_route(&atlas.routes, quest, position.map, arrived)?;
        if route.is_empty() {
            return Err(NavError::RouteComplete {
                quest: quest.to_string(),
                map: route.map(),
            });
        }

        if route.map() != position.map {
            let index = self.state.cursor.unwrap_or(0).min(route.len() - 1);
            return self.toward_warp(atlas, position, route, viewport, index);
        }

        self.snap_if_needed(route, &position);
        let mut cursor = self.state.cursor.unwrap_or(0);
        if cursor < route.len() && route.points()[cursor] == position {
            cursor += 1;
            self.state.cursor = Some(cursor);
            trace!("navigator: reached point {}, cursor now {cursor}", cursor - 1);
        }
        if cursor >= route.len() {
            return self.continue_with_next_segment(atlas, position, route, viewport);
        }

        let target = route.points()[cursor];
        self.move_toward(atlas, position, target, viewport)
    }

    /// The current segment is exhausted: carry on toward the quest's next
    /// segment through a warp, or report the route complete.
    fn continue_with_next_segment(
        &mut self,
        atlas: &Atlas,
        position: GlobalCoord,
        route: &RouteSegment,
        viewport: Option<&Viewport>,
    ) -> Result<Action, NavError> {
        let Some(next) = atlas
            .routes
            .next_segment(route.key())
            .filter(|next| next.map() != position.map && !next.is_empty())
        else {
            debug!("navigator: end of route for quest {} on {}", route.key().quest, route.map());
            return Err(complete(route));
        };
        info!(
            "navigator: segment on {} done, continuing toward {}",
            route.map(),
            next.map()
        );
        self.state.active_route = Some(next.key().clone());
        self.state.cursor = Some(0);
        self.toward_warp(atlas, position, next, viewport, 0)
    }

    /// The segment to follow on `map`, updating the active route if it changes.
    ///
    /// While the agent stays on one map, a segment already handed over to
    /// (declared later for the same quest) keeps priority over the local one.
    fn resolve_route<'a>(
        &mut self,
        routes: &'a RouteStore,
        quest: &str,
        map: MapId,
        arrived: bool,
    ) -> Result<&'a RouteSegment, NavError> {
        if let Some(route) = routes.find_route_for(quest, map) {
            let active = self.state.active_route.as_ref();
            if active == Some(route.key()) {
                return Ok(route);
            }
            let handed_over = !arrived && active.is_some_and(|key| routes.declared_after(key, route.key()));
            if !handed_over {
                debug!("navigator: switching to quest {quest} route on {map}");
                self.state.active_route = Some(route.key().clone());
                self.state.cursor = None;
                return Ok(route);
            }
        }
        self.state
            .active_route
            .as_ref()
            .filter(|key| key.quest == quest)
            .and_then(|key| routes.get(key))
            .ok_or_else(|| NavError::NoRouteForMap {
                quest: quest.to_string(),
                map,
            })
    }

    fn snap_if_needed(&mut self, route: &RouteSegment, position: &GlobalCoord) {
        let reference = match self.state.cursor {
            None => None,
            Some(cursor) => route.get(cursor.min(route.len() - 1)),
        };
        let close = reference.is_some_and(|point| point.manhattan(position) <= self.snap_radius);
        if close {
            return;
        }
        let snapped = nearest_point(route, position);
        debug!(
            "navigator: snapping cursor {:?} -> {snapped:?} at {position}",
            self.state.cursor
        );
        self.state.cursor = snapped;
    }

    /// Head for the warp on this map that leads to the route's map.
    fn toward_warp(
        &self,
        atlas: &Atlas,
        position: GlobalCoord,
        route: &RouteSegment,
        viewport: Option<&Viewport>,
        index: usize,
    ) -> Result<Action, NavError> {
        let Some(warp) = atlas.routes.nearest_warp(position.map, &position, route.map()) else {
            info!("navigator: no warp on {} toward {}", position.map, route.map());
            return Err(NavError::PathNotFound {
                from: position,
                toward: route.get(index).copied(),
            });
        };
        if warp.at.same_tile(&position) {
            return warp.exit.map(Action::Walk).ok_or(NavError::PathNotFound {
                from: position,
                toward: Some(warp.at),
            });
        }
        debug!("navigator: heading for warp at {} to {}", warp.at, warp.destination);
        self.move_toward(atlas, position, warp.at, viewport)
    }

    fn move_toward(
        &self,
        atlas: &Atlas,
        position: GlobalCoord,
        target: GlobalCoord,
        viewport: Option<&Viewport>,
    ) -> Result<Action, NavError> {
        if self.local_pathfinding
            && let Some(grid) = viewport.filter(|grid| grid.is_well_formed())
        {
            let finder = Pathfinder::new(grid, atlas.transition_rules(position.map));
            let goal = grid.cell_toward(&position, &target);
            let path = finder
                .find_path(grid.anchor(), goal)
                .ok_or(NavError::PathNotFound {
                    from: position,
                    toward: Some(target),
                })?;
            if let Some(first) = path.first() {
                return Ok(Action::Walk(*first));
            }
        }
        let (dr, dc) = position.delta_to(&target);
        Direction::toward(dr, dc)
            .map(Action::Walk)
            .ok_or(NavError::PathNotFound {
                from: position,
                toward: Some(target),
            })
    }
}

#[allow(clippy::ref_option)]
fn describe_target(toward: &Option<GlobalCoord>) -> String {
    toward.map(|target| format!(" toward {target}")).unwrap_or_default()
}

fn complete(route: &RouteSegment) -> NavError {
    NavError::RouteComplete {
        quest: route.key().quest.clone(),
        map: route.map(),
    }
}
