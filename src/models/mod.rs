pub mod enums;
pub mod rule;
pub mod criteria;
pub mod profile;
pub mod trial;
pub mod verdict;
pub mod match_result;
