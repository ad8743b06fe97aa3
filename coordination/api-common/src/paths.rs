pub const DEPENDENCIES: &str = "/dependencies/:name";
pub const BLOCK_DEPENDENCIES: &str = "/blockDependencies/:name";
pub const EVENT: &str = "/events/:name";
pub const EVENTS: &str = "/events";

/// Leading path segment of each route. Clients append the event name as a
/// separate, percent-encoded segment.
pub mod segments {
    pub const DEPENDENCIES: &str = "dependencies";
    pub const BLOCK_DEPENDENCIES: &str = "blockDependencies";
    pub const EVENTS: &str = "events";
}
