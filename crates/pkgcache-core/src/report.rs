#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub level: Level,
    pub message: String,
}

/// Destination for the human-readable lines an action produces.
pub trait Reporter {
    fn info(&mut self, message: &str);
    fn warn(&mut self, message: &str);
}

impl Reporter for Vec<ReportLine> {
    fn info(&mut self, message: &str) {
        self.push(ReportLine {
            level: Level::Info,
            message: message.to_string(),
        });
    }

    fn warn(&mut self, message: &str) {
        self.push(ReportLine {
            level: Level::Warn,
            message: message.to_string(),
        });
    }
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn info(&mut self, message: &str) {
        (**self).info(message);
    }

    fn warn(&mut self, message: &str) {
        (**self).warn(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Done,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    /// Any failed unit makes the whole action a failure.
    pub fn fold<I>(outcomes: I) -> Status
    where
        I: IntoIterator<Item = UnitOutcome>,
    {
        outcomes
            .into_iter()
            .fold(Status::Success, |status, outcome| match outcome {
                UnitOutcome::Failed => Status::Failure,
                _ => status,
            })
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Failure => 1,
        }
    }
}
