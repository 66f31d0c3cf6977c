// Module layout
// - bootstrap: configuration, logging, module registry and server startup
// - infrastructure: database engine, sessions and the generic data model
// - presentation: HTTP handlers, envelopes and middleware

pub mod bootstrap;
pub mod infrastructure;
pub mod presentation;
