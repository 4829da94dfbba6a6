use thiserror::Error;

pub const SYMBOLS: &str = "!@$_";
pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_PASSWORD_LEN: usize = 24;
pub const RECEIPT_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("Please enter room number, password and receipt number.")]
    MissingFields,
    #[error("Room number already registered.")]
    AlreadyRegistered,
    #[error("Room number is of form \"***L\" where * is numeric and L is an alphabet.")]
    RoomNumberFormat,
    #[error("Password must be 5 to 24 characters long.")]
    PasswordLength,
    #[error("Password must contain at least one special character, alphabet and number.")]
    PasswordMissingClass,
    #[error("Password must not contain characters other than !@$_, alphabets and numbers.")]
    PasswordForbiddenChar,
    #[error("Receipt Number must be a 10 digit numeric.")]
    ReceiptFormat,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Three ASCII digits followed by an ASCII uppercase letter, e.g. `101A`.
pub fn is_room_number(room_number: &str) -> bool {
    let chars: Vec<char> = room_number.chars().collect();
    chars.len() == 4
        && chars[..3].iter().all(char::is_ascii_digit)
        && chars[3].is_ascii_uppercase()
}

fn is_symbol(c: char) -> bool {
    SYMBOLS.contains(c)
}

fn is_letter(c: char) -> bool {
    c.is_ascii_lowercase()
}

/// Checks a proposed account. Rules run in a fixed order and the first failure wins.
pub fn validate(
    room_number: &str,
    password: &str,
    receipt_number: &str,
    already_registered: bool,
) -> Result<(), SignupError> {
    if room_number.is_empty() || password.is_empty() || receipt_number.is_empty() {
        return Err(SignupError::MissingFields);
    }

    if already_registered {
        return Err(SignupError::AlreadyRegistered);
    }

    if !is_room_number(room_number) {
        return Err(SignupError::RoomNumberFormat);
    }

    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(SignupError::PasswordLength);
    }

    let lowered: Vec<char> = password.chars().map(|c| c.to_ascii_lowercase()).collect();
    let has_symbol = lowered.iter().any(|&c| is_symbol(c));
    let has_digit = lowered.iter().any(char::is_ascii_digit);
    let has_letter = lowered.iter().any(|&c| is_letter(c));
    if !(has_symbol && has_digit && has_letter) {
        return Err(SignupError::PasswordMissingClass);
    }

    if lowered.iter().any(|&c| !(is_symbol(c) || c.is_ascii_digit() || is_letter(c))) {
        return Err(SignupError::PasswordForbiddenChar);
    }

    if receipt_number.len() != RECEIPT_LEN || !receipt_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(SignupError::ReceiptFormat);
    }

    Ok(())
}
