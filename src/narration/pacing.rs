use std::time::Duration;

pub const CHAR_DELAY: Duration = Duration::from_millis(30);
pub const PAUSE_DELAY: Duration = Duration::from_millis(120);

/// Delay after revealing `ch`.
pub fn reveal_delay(ch: char) -> Duration {
    match ch {
        '.' | ',' => PAUSE_DELAY,
        _ => CHAR_DELAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_stretches_the_pause() {
        assert_eq!(reveal_delay('a'), CHAR_DELAY);
        assert_eq!(reveal_delay('.'), PAUSE_DELAY);
        assert_eq!(reveal_delay(','), PAUSE_DELAY);
        assert_eq!(reveal_delay('!'), CHAR_DELAY);
    }
}
