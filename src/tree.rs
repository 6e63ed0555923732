//! Task tree utilities.
//!
//! A forest is the ordered list of top-level tasks returned by one list query,
//! each carrying its subtasks. The client side only reads it (flatten and
//! count); the backend side builds and filters it.

use crate::tables::{Priority, Task, TaskFilter};

// * Traversal ................................................................

/// Pre-order linearization: every task is followed by its own subtasks.
pub fn flatten(forest: &[Task]) -> Vec<&Task> {
    let mut result = Vec::new();
    fn collect<'a>(tasks: &'a [Task], result: &mut Vec<&'a Task>) {
        for task in tasks {
            result.push(task);
            collect(&task.subtasks, result);
        }
    }
    collect(forest, &mut result);
    result
}

/// Same order as [`flatten`], paired with the nesting depth (roots are 0).
pub fn flatten_with_depth(forest: &[Task]) -> Vec<(&Task, usize)> {
    let mut result = Vec::new();
    fn collect<'a>(tasks: &'a [Task], depth: usize, result: &mut Vec<(&'a Task, usize)>) {
        for task in tasks {
            result.push((task, depth));
            collect(&task.subtasks, depth + 1, result);
        }
    }
    collect(forest, 0, &mut result);
    result
}

pub fn count_all(forest: &[Task]) -> usize {
    forest.iter().map(|t| 1 + count_all(&t.subtasks)).sum()
}

/// Number of tasks at any depth whose completion flag is false.
pub fn count_incomplete(forest: &[Task]) -> usize {
    forest
        .iter()
        .map(|t| usize::from(!t.is_completed) + count_incomplete(&t.subtasks))
        .sum()
}

pub fn find(forest: &[Task], id: i32) -> Option<&Task> {
    flatten(forest).into_iter().find(|t| t.id == id)
}

// * Building .................................................................

/// Builds the forest below `parent_id` from a flat list.
///
/// Input order is kept at every level. A task without its own category shows
/// the effective category of its parent.
pub fn build_tree(tasks: &[Task], parent_id: Option<i32>, parent_category: Option<&str>) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.parent_id == parent_id)
        .map(|t| {
            let category = effective_category(t.category.as_deref(), parent_category);
            let subtasks = build_tree(tasks, Some(t.id), category.as_deref());
            Task {
                category,
                subtasks,
                ..t.clone()
            }
        })
        .collect()
}

pub(crate) fn effective_category(own: Option<&str>, inherited: Option<&str>) -> Option<String> {
    own.filter(|c| !c.is_empty())
        .or(inherited)
        .map(str::to_string)
}

// * Filtering ................................................................

// Keeps a task if it matches, or if any of its subtasks survives the same
// filter, so the path down to every match is preserved.
fn retain_tree<F>(forest: &[Task], matches: &F) -> Vec<Task>
where
    F: Fn(&Task) -> bool,
{
    forest
        .iter()
        .filter_map(|task| {
            let subtasks = retain_tree(&task.subtasks, matches);
            if matches(task) || !subtasks.is_empty() {
                Some(Task {
                    subtasks,
                    ..task.clone()
                })
            } else {
                None
            }
        })
        .collect()
}

pub fn filter_by_completion(forest: &[Task], filter: TaskFilter) -> Vec<Task> {
    match filter {
        TaskFilter::All => forest.to_vec(),
        TaskFilter::Completed => retain_tree(forest, &|t: &Task| t.is_completed),
        TaskFilter::Incomplete => retain_tree(forest, &|t: &Task| !t.is_completed),
    }
}

pub fn filter_by_category(forest: &[Task], category: &str) -> Vec<Task> {
    retain_tree(forest, &|t: &Task| t.category.as_deref() == Some(category))
}

pub fn filter_by_priority(forest: &[Task], priority: Priority) -> Vec<Task> {
    retain_tree(forest, &|t: &Task| t.priority == priority)
}
