/// A reaction the bot leaves on a Discord message it couldn't relay as-is
#[derive(Debug)]
pub struct Reaction {
    emoji: &'static str,
    description: &'static str,
}

impl Reaction {
    pub fn all() -> &'static [&'static Self] {
        &[&ILLEGAL_CHARACTERS, &TOO_LONG, &EMPTY_FIELD, &NOT_DELIVERED]
    }

    pub fn emoji(&self) -> &'static str {
        self.emoji
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

pub const ILLEGAL_CHARACTERS: Reaction = Reaction {
    emoji: "✂️",
    description: "The message or your nickname contains illegal characters",
};

pub const TOO_LONG: Reaction = Reaction {
    emoji: "📏",
    description: "The message is longer than 256 characters and was cut off",
};

pub const EMPTY_FIELD: Reaction = Reaction {
    emoji: "❌",
    description: "The message or your name had no content after cleaning",
};

pub const NOT_DELIVERED: Reaction = Reaction {
    emoji: "📵",
    description: "The message could not be delivered to the server",
};
