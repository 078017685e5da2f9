use ironbucket::io::cloud::ObjectSummary;
use ironbucket::source::{TaskAssignment, TaskFilter};
use std::collections::HashSet;

fn objects() -> Vec<ObjectSummary> {
    (0..200)
        .map(|i| ObjectSummary::new(format!("topic-{:02}-{}.txt", i % 7, 1_700_000_000 + i), 10))
        .chain([
            ObjectSummary::new("empty-0-1.txt", 0),
            ObjectSummary::new("ünïcödé-1-2.txt", 3),
            ObjectSummary::new("", 1),
        ])
        .collect()
}

#[test]
fn workers_partition_objects_without_overlap() {
    let objects = objects();
    let failed: HashSet<String> = ["topic-03-1700000010.txt".to_string()].into();
    let expected: HashSet<&str> = objects
        .iter()
        .filter(|o| o.size > 0 && !failed.contains(&o.key))
        .map(|o| o.key.as_str())
        .collect();

    for worker_count in 1..=8 {
        let mut seen: HashSet<&str> = HashSet::new();
        for task_id in 0..worker_count {
            let filter = TaskFilter::new(TaskAssignment::resolve(Some(task_id), Some(worker_count)))
                .with_failed_keys(failed.iter().cloned());
            for object in objects.iter().filter(|o| filter.accepts(o)) {
                assert!(
                    seen.insert(object.key.as_str()),
                    "{} accepted twice with {worker_count} workers",
                    object.key
                );
            }
        }
        assert_eq!(seen, expected, "incomplete cover with {worker_count} workers");
    }
}

#[test]
fn filter_is_pure() {
    let filter = TaskFilter::new(TaskAssignment::resolve(Some(1), Some(3)));
    for object in objects() {
        assert_eq!(filter.accepts(&object), filter.accepts(&object));
    }
}

#[test]
fn task_id_beyond_worker_count_wraps() {
    let direct = TaskFilter::new(TaskAssignment::resolve(Some(2), Some(4)));
    let wrapped = TaskFilter::new(TaskAssignment::resolve(Some(6), Some(4)));
    for object in objects() {
        assert_eq!(direct.accepts(&object), wrapped.accepts(&object));
    }
}

#[test]
fn invalid_worker_count_accepts_everything_non_empty() {
    let filter = TaskFilter::new(TaskAssignment::resolve(Some(5), Some(0)));
    assert_eq!(filter.assignment(), TaskAssignment::SINGLE);
    let accepted = objects().iter().filter(|o| filter.accepts(o)).count();
    assert_eq!(accepted, 202);
}
