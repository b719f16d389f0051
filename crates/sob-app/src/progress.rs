use sob_core::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStage {
    Meshing,
    AllocatingRun,
    WritingDeck,
    RunningSolver,
    ExtractingResults,
    Reducing,
    SavingResults,
    Completed,
}

impl EvaluationStage {
    pub fn label(self) -> &'static str {
        match self {
            EvaluationStage::Meshing => "meshing",
            EvaluationStage::AllocatingRun => "allocating run",
            EvaluationStage::WritingDeck => "writing deck",
            EvaluationStage::RunningSolver => "running solver",
            EvaluationStage::ExtractingResults => "extracting results",
            EvaluationStage::Reducing => "reducing",
            EvaluationStage::SavingResults => "saving results",
            EvaluationStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationProgress {
    pub stage: EvaluationStage,
    /// Known once the run directory is allocated.
    pub run_id: Option<RunId>,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}
