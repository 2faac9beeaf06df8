//! A1-style column letters and cell names.

/// Column letters to a 1-based column number (A=1, Z=26, AA=27).
pub fn column_number(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n)
}

/// 1-based column number to letters. Zero has no letters.
pub fn column_letters(mut number: usize) -> String {
    let mut out = Vec::new();
    while number > 0 {
        let rem = (number - 1) % 26;
        out.push(b'A' + rem as u8);
        number = (number - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// 0-based column index to letters.
pub fn col_to_letter(col: usize) -> String {
    column_letters(col + 1)
}

/// 0-based (row, col) to a cell name like `B5`.
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{}{}", col_to_letter(col), row + 1)
}

/// Parse `B5` into 0-based (row, col).
pub fn parse_cell_name(name: &str) -> Option<(usize, usize)> {
    let name = name.trim();
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = name.split_at(split);
    let col = column_number(letters)?;
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}
