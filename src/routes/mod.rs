pub mod auth;
pub mod cors;
pub mod routes;

#[cfg(test)]
mod tests;
