use lazy_static::lazy_static;
use prometheus::register_int_counter;
use prometheus::register_int_counter_vec;
use prometheus::{IntCounter, IntCounterVec};

lazy_static! {

    // Recorded in the study routes
    pub static ref TOPIC_COMPLETIONS: IntCounter =
        register_int_counter!("lextrail_topic_completions", "Number of topics marked complete").unwrap();

    pub static ref POINTS_AWARDED: IntCounter =
        register_int_counter!("lextrail_points_awarded", "Total study points handed out").unwrap();

    pub static ref ACHIEVEMENTS_UNLOCKED: IntCounterVec =
        register_int_counter_vec!("lextrail_achievements_unlocked", "Number of unlocks of an achievement", &["achievement"]).unwrap();
}
