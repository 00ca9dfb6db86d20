pub mod contactdb;
pub mod db;
#[cfg(test)]
pub mod memorydb;
pub mod userdb;
