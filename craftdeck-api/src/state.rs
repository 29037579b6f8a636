use craftdeck_orchestrator::EnvironmentService;

#[derive(Clone)]
pub struct AppState {
    pub service: EnvironmentService,
}

impl AppState {
    pub fn new(service: EnvironmentService) -> Self {
        Self { service }
    }
}
