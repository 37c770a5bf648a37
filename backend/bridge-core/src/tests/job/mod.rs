mod auth;
mod diagnostics;
mod tracker;
