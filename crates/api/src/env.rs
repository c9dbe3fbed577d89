use lextrail_common::EnvVars;
use lextrail_study::DEFAULT_COMPLETION_POINTS;

pub struct ApiServerEnv {
    pub secret_salt: String,
    pub completion_points: String,
}

impl EnvVars for ApiServerEnv {
    fn load() -> Self {
        Self {
            secret_salt: std::env::var("SECRET_SALT").unwrap(),
            completion_points: std::env::var("COMPLETION_POINTS")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_POINTS.to_string()),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "SECRET_SALT" => self.secret_salt.clone(),
            "COMPLETION_POINTS" => self.completion_points.clone(),
            _ => panic!("{} is not set", key),
        }
    }
}
