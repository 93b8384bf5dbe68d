pub mod costmap;
pub mod routesearch;
pub mod tiles;
pub mod world;
