//! Final run summary.

use crate::models::RunStatistics;
use colored::Colorize;

/// Human-readable summary of a run, one line per item.
pub fn summary_lines(stats: &RunStatistics, dry_run: bool) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Problems found: {} broken, {} lost IP address(es)",
            stats.broken, stats.lost
        ),
        format!(
            "Fixed {} of {} lost IP address(es)",
            stats.fixed, stats.lost
        ),
    ];
    if dry_run {
        lines.push("Dry run: nothing was written to the CMDB".to_string());
    }
    lines
}

/// Print the summary to stdout.
pub fn print_summary(stats: &RunStatistics, dry_run: bool) {
    for (i, line) in summary_lines(stats, dry_run).iter().enumerate() {
        if i == 0 && stats.problems() > 0 {
            println!("{}", line.yellow());
        } else if dry_run && i == 2 {
            println!("{}", line.on_blue());
        } else {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let stats = RunStatistics {
            broken: 2,
            lost: 7,
            fixed: 4,
        };
        let lines = summary_lines(&stats, false);
        assert_eq!(
            lines,
            vec![
                "Problems found: 2 broken, 7 lost IP address(es)",
                "Fixed 4 of 7 lost IP address(es)",
            ]
        );
    }

    #[test]
    fn test_summary_lines_dry_run() {
        let lines = summary_lines(&RunStatistics::default(), true);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Fixed 0 of 0 lost IP address(es)");
    }
}
