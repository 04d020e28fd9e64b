//! The yes/no "will you be my ..." prompts.

/// Who is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proposal {
    Girlfriend,
    Boyfriend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Accepts exactly `yes` or `no`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

impl Proposal {
    pub fn question(self) -> &'static str {
        match self {
            Self::Girlfriend => "Will you be my girlfriend?",
            Self::Boyfriend => "Will you be my boyfriend?",
        }
    }

    /// Message shown after the form is submitted. `None` means the answer was not understood.
    pub fn response(self, answer: Option<Answer>) -> &'static str {
        match (self, answer) {
            (Self::Girlfriend, Some(Answer::Yes)) => "Congratulations! She said YES! 🎉",
            (Self::Girlfriend, Some(Answer::No)) => "Sorry, she said NO. 😢",
            (Self::Boyfriend, Some(Answer::Yes)) => "Congratulations! He said YES! 🎉",
            (Self::Boyfriend, Some(Answer::No)) => "Sorry, he said NO. 😢",
            (_, None) => "Invalid response.",
        }
    }
}
