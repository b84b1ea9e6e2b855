use catalog_controller::SearchController;
use catalog_core::traits::SearchBackend;
use catalog_core::types::Dimension;
use catalog_results::PageItem;

const FACET_ROWS: usize = 8;

fn dimension_title(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Genre => "Genre",
        Dimension::Type => "Type",
        Dimension::Tags => "Tags",
        Dimension::Author => "Author",
    }
}

pub fn facets<B: SearchBackend + 'static>(controller: &SearchController<B>) {
    let filter = controller.filter();
    for dimension in Dimension::ALL {
        let options = controller.facets(dimension);
        if options.is_empty() {
            continue;
        }
        let selected = filter.selected(dimension);
        let mut line = Vec::new();
        // Selected options are always listed, even beyond the visible rows.
        for (i, option) in options.iter().enumerate() {
            let is_selected = selected.contains(&option.code);
            if i >= FACET_ROWS && !is_selected {
                continue;
            }
            let mark = if is_selected { "[x]" } else { "[ ]" };
            line.push(format!("{mark} {} ({})", option.label, option.count));
        }
        println!("{}: {}", dimension_title(dimension), line.join("  "));
    }
}

pub fn results<B: SearchBackend + 'static>(controller: &SearchController<B>) {
    if let Some(failure) = controller.error() {
        println!("! Search failed: {}", failure.message);
        if failure.results_kept {
            println!("  Showing the previous results. /retry to try again.");
        } else {
            println!("  /retry to try again.");
        }
    }
    let Some(view) = controller.results() else {
        return;
    };
    let response = view.response();
    if view.is_empty() {
        println!("No results. /reset clears the filters.");
        return;
    }
    println!("{} hits in {} works", response.total_hits, response.total_works);
    for group in view.groups() {
        let hit = &group.first_hit;
        let year = hit.year.map(|y| format!(" ({y})")).unwrap_or_default();
        let author = hit.author.as_deref().map(|a| format!(" / {a}")).unwrap_or_default();
        println!("\n[{}] {}{}{}", group.work_id, hit.title, year, author);
        for visible in group.visible_hits() {
            println!("    p.{:<4} {}", visible.page_number, visible.snippet);
        }
        if group.is_loading_additional() {
            println!("    loading more hits...");
        } else if group.is_expanded() {
            if let Some(overflow) = group.overflow(view.cap()) {
                println!("    showing {} of {} hits", overflow.shown, overflow.total);
            }
        } else if group.can_expand() {
            println!("    {} hits in this work, /expand {}", group.hit_count_for_work, group.work_id);
        }
    }
    let window = controller.page_window();
    if window.len() > 1 {
        let current = controller.filter().page;
        let pages: Vec<String> = window
            .iter()
            .map(|item| match item {
                PageItem::Page(n) if *n == current => format!("[{n}]"),
                other => other.to_string(),
            })
            .collect();
        println!("\nPages: {}", pages.join(" "));
    }
}
