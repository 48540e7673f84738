use colored::Colorize;

const LOGO: &str = r"
        ........................................
        ........................................
        ...............WWNNNNNNWW...............
        .............WNXNNWWWWNNXNW.............
        .............NXN........NXN.............
        ............WXXW........WXXW............
        ............WXNW........WNNW............
        ............NXXNNNNWWWNNNNNW............
        ...........WKOkkOOOOOOOOOOOKW...........
        ...........N0kxxxxdoodxxxkk0W...........
        ...........N0kxxxx:..;dxxkk0W...........
        ...........N0kxxxx:..,dxxkk0N...........
        ...........N0kxxxxl;,:dxxkk0N...........
        ...........WX0OOOOOOOOOOOO0XW...........
        ............WWWWWWWWWWWWWWWW............
        ........................................
        ........................................
";

/// Print a success message.
pub fn success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Welcome banner shown before a protect or unprotect result.
pub fn banner() {
    println!("\n        \t{}", "Welcome to Data-Protector!".bold());
    println!("{}", LOGO.cyan());
}

/// Print usage for the positional form.
pub fn usage() {
    eprintln!("data-protector v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("-------------");
    eprintln!("\n{}", "Usage:".bold());
    eprintln!("  data-protector <E|D> <namespace> <plaintext|ciphertext> [true|false]");
    eprintln!();
    eprintln!("  E          protect the input and print the payload");
    eprintln!("  D          unprotect a payload and print the plaintext");
    eprintln!("  true       silence the banner");
    eprintln!();
    eprintln!("  data-protector keys <list|rotate|revoke <id>>");
    eprintln!();
    eprintln!("  Keys are kept in KeyOutputLocation from dp.json (or --key-location).");
    eprintln!("  Without ApplicationName every caller on this machine shares one key ring.");
    eprintln!("  data-protector --help for all options");
}
