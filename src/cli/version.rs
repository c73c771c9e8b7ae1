/// Display version information
pub fn execute() {
    println!("portico {}", env!("CARGO_PKG_VERSION"));
    println!("Client portal service for proposal approvals");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        // Version command should not panic
        execute();
    }
}
