#[derive(Debug, Clone)]
pub struct StageMetrics {
    pub index: usize,
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    /// Names of the stages that ran, in order
    pub fn stages_run(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name.as_str()).collect()
    }
}
