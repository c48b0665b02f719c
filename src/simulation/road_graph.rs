//! Road graph queries consumed by the traffic engine
//!
//! The engine only ever asks three questions of the road network: which cells
//! are roads, which road cells touch a given cell, and whether a cell is still
//! a road. Adjacency is derived on every call because the road editor may
//! change the network between ticks.

use anyhow::{bail, Context, Result};
use petgraph::graphmap::UnGraphMap;

use super::types::GridPos;

/// Read-only view of the drivable road network
pub trait RoadGraph {
    /// All current road node positions
    fn all_road_nodes(&self) -> Vec<GridPos>;

    /// Road nodes currently adjacent to `node`
    fn neighbors(&self, node: GridPos) -> Vec<GridPos>;

    /// Whether `position` currently holds a road node
    fn is_road(&self, position: GridPos) -> bool;

    fn node_count(&self) -> usize {
        self.all_road_nodes().len()
    }
}

/// Grid-backed road network standing in for the road placement subsystem
///
/// Each road cell is a node; placing a cell connects it to the road cells on
/// its four sides, removing it drops those connections.
#[derive(Debug, Clone, Default)]
pub struct GridRoadNetwork {
    graph: UnGraphMap<GridPos, ()>,
}

impl GridRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a road cell. Returns false if the cell already held a road.
    pub fn add_road(&mut self, cell: GridPos) -> bool {
        if self.graph.contains_node(cell) {
            return false;
        }

        self.graph.add_node(cell);
        for neighbor in cell.adjacent() {
            if self.graph.contains_node(neighbor) {
                self.graph.add_edge(cell, neighbor, ());
            }
        }
        true
    }

    /// Remove a road cell and every connection through it
    pub fn remove_road(&mut self, cell: GridPos) -> Result<()> {
        if !self.graph.remove_node(cell) {
            bail!("No road at {:?}", cell);
        }
        Ok(())
    }

    /// Place a straight run of road cells between two cells on the same row or column
    pub fn add_straight_road(&mut self, from: GridPos, to: GridPos) -> Result<usize> {
        if from.x != to.x && from.z != to.z {
            bail!("Road from {:?} to {:?} is not axis aligned", from, to);
        }

        let dx = to.x.cmp(&from.x) as i32;
        let dz = to.z.cmp(&from.z) as i32;
        let mut cell = from;
        let mut placed = 0;
        loop {
            if self.add_road(cell) {
                placed += 1;
            }
            if cell == to {
                break;
            }
            let Some(next) = cell.offset(dx, dz) else {
                break;
            };
            cell = next;
        }
        Ok(placed)
    }

    /// Build a network from a text layout where `#` marks a road cell
    ///
    /// Rows map to increasing `z`, columns to increasing `x`. `.` and spaces
    /// are empty ground.
    pub fn from_ascii(layout: &str) -> Result<Self> {
        let mut network = Self::new();
        for (row, line) in layout.lines().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                match ch {
                    '#' => {
                        let x = i32::try_from(col).context("Map is too wide")?;
                        let z = i32::try_from(row).context("Map is too tall")?;
                        network.add_road(GridPos::new(x, z));
                    }
                    '.' | ' ' | '\r' => {}
                    other => bail!(
                        "Unexpected character {:?} at row {}, column {}",
                        other,
                        row + 1,
                        col + 1
                    ),
                }
            }
        }
        Ok(network)
    }

    /// A small town: two loops joined by a main street, with a few dead ends
    pub fn create_test_network() -> Self {
        const LAYOUT: &str = "\
#########....
#...#...#..#.
#...#...#####
#...#...#...#
#########...#
....#.......#
....#########
....#........
....#........";
        // The layout is a constant and only contains valid characters
        Self::from_ascii(LAYOUT).unwrap_or_default()
    }

    /// Number of connections between road cells
    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Bounding box of all road cells as (min, max)
    pub fn bounds(&self) -> Option<(GridPos, GridPos)> {
        let mut nodes = self.graph.nodes();
        let first = nodes.next()?;
        Some(nodes.fold((first, first), |(min, max), cell| {
            (
                GridPos::new(min.x.min(cell.x), min.z.min(cell.z)),
                GridPos::new(max.x.max(cell.x), max.z.max(cell.z)),
            )
        }))
    }
}

impl RoadGraph for GridRoadNetwork {
    fn all_road_nodes(&self) -> Vec<GridPos> {
        let mut nodes: Vec<GridPos> = self.graph.nodes().collect();
        nodes.sort();
        nodes
    }

    fn neighbors(&self, node: GridPos) -> Vec<GridPos> {
        if !self.graph.contains_node(node) {
            return Vec::new();
        }
        node.adjacent()
            .filter(|candidate| self.graph.contains_edge(node, *candidate))
            .collect()
    }

    fn is_road(&self, position: GridPos) -> bool {
        self.graph.contains_node(position)
    }

    fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
