use avatrack::{spatial_iou, Bbox, BoxMatcher, Detection, IdentityPropagator};

fn main() {
    println!("Testing identity stitching...");

    // Tracker output: person ids are 1-based
    let with_identity = vec![
        Detection::new("video_001", 1, Bbox::new(0.10, 0.10, 0.30, 0.50), 0).with_person_id(1),
        Detection::new("video_001", 1, Bbox::new(0.60, 0.10, 0.80, 0.50), 0).with_person_id(2),
    ];

    // Action-labelled boxes from a separate detection run
    let without_identity = vec![
        Detection::new("video_001", 1, Bbox::new(0.101, 0.10, 0.30, 0.50), 1),
        Detection::new("video_001", 1, Bbox::new(0.60, 0.10, 0.80, 0.50), 12),
        Detection::new("video_001", 2, Bbox::new(0.40, 0.40, 0.50, 0.60), 7),
        Detection::new("video_001", 3, Bbox::new(0.402, 0.40, 0.50, 0.60), 7),
    ];

    let outcome = BoxMatcher::match_records(&with_identity, &without_identity);
    println!(
        "Matched: {}, unmatched: {}",
        outcome.matched, outcome.unmatched
    );

    let mut records = outcome.records;
    let start = std::time::Instant::now();
    let stats = IdentityPropagator::sort_and_run(&mut records).unwrap();
    println!("Propagated in {:?}: {:?}", start.elapsed(), stats);

    for record in &records {
        println!(
            "  {} action {} -> person {}",
            record.position(),
            record.action_label,
            record.person_id
        );
    }

    println!("\nTesting spatial IoU...");
    let iou = spatial_iou(
        &Bbox::new(0.1, 0.1, 0.5, 0.5),
        &Bbox::new(0.3, 0.1, 0.7, 0.5),
    );
    println!("IoU: {:.3}", iou);

    println!("✅ Stitching example finished");
}
