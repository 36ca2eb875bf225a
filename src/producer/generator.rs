//! Synthetic event selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::{Event, Level};

/// Services events are attributed to.
pub const SERVICES: [&str; 3] = ["auth-service", "payment-service", "user-service"];

const INFO_MESSAGES: [&str; 3] = [
    "Пользователь вошел в систему",
    "Операция выполнена успешно",
    "Запрос обработан",
];

const WARNING_MESSAGES: [&str; 3] = [
    "Повторная попытка операции",
    "Медленный ответ от БД",
    "Ресурс близок к исчерпанию",
];

const ERROR_MESSAGES: [&str; 3] = [
    "Сбой аутентификации",
    "Ошибка соединения с БД",
    "Недостаточно прав доступа",
];

/// Message pool for a severity.
pub fn messages_for(level: Level) -> &'static [&'static str] {
    match level {
        Level::Info => &INFO_MESSAGES,
        Level::Warning => &WARNING_MESSAGES,
        Level::Error => &ERROR_MESSAGES,
    }
}

/// Draws uniformly random events from the fixed roster.
///
/// The random source is owned here, so a fixed seed reproduces the exact
/// sequence of (level, service, message) triples.
pub struct EventGenerator {
    rng: StdRng,
}

impl EventGenerator {
    /// Seeded when `seed` is given, OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self {
                rng: StdRng::from_os_rng(),
            },
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw the next event, stamped with `timestamp`.
    pub fn next_event(&mut self, timestamp: i64) -> Event {
        let level = Level::ALL[self.rng.random_range(0..Level::ALL.len())];
        let service = SERVICES[self.rng.random_range(0..SERVICES.len())];
        let pool = messages_for(level);
        let message = pool[self.rng.random_range(0..pool.len())];
        Event::new(timestamp, level, service, message)
    }
}
