table! {
    benchmarks (id) {
        id -> Int4,
        name -> Text,
        parent_id -> Nullable<Int4>,
        benchmark_type -> Text,
        data_type -> Text,
        description -> Text,
        units_title -> Text,
        units -> Text,
        lessisbetter -> Bool,
        default_on_changes -> Bool,
    }
}

table! {
    branches (id) {
        id -> Int4,
        name -> Text,
        project_id -> Int4,
    }
}

table! {
    environments (id) {
        id -> Int4,
        name -> Text,
        cpu -> Text,
        memory -> Text,
        os -> Text,
        kernel -> Text,
    }
}

table! {
    executables (id) {
        id -> Int4,
        name -> Text,
        description -> Text,
        project_id -> Int4,
    }
}

table! {
    projects (id) {
        id -> Int4,
        name -> Text,
        repo_type -> Text,
        repo_path -> Text,
        repo_user -> Text,
        repo_pass -> Text,
        commit_browsing_url -> Text,
        track -> Bool,
        default_branch -> Text,
    }
}

table! {
    reports (id) {
        id -> Int4,
        revision_id -> Int4,
        environment_id -> Int4,
        executable_id -> Int4,
        summary -> Text,
        colorcode -> Text,
        updated_at -> Timestamp,
    }
}

table! {
    results (id) {
        id -> Int4,
        value -> Float8,
        std_dev -> Nullable<Float8>,
        val_min -> Nullable<Float8>,
        val_max -> Nullable<Float8>,
        date -> Timestamp,
        revision_id -> Int4,
        executable_id -> Int4,
        benchmark_id -> Int4,
        environment_id -> Int4,
    }
}

table! {
    revisions (id) {
        id -> Int4,
        commitid -> Text,
        tag -> Text,
        date -> Timestamp,
        message -> Text,
        author -> Text,
        project_id -> Int4,
        branch_id -> Int4,
    }
}

table! {
    users (id) {
        id -> Int4,
        username -> Text,
        email -> Text,
        password -> Text,
        api_key -> Text,
        created_at -> Timestamp,
    }
}

joinable!(branches -> projects (project_id));
joinable!(executables -> projects (project_id));
joinable!(reports -> environments (environment_id));
joinable!(reports -> executables (executable_id));
joinable!(reports -> revisions (revision_id));
joinable!(results -> benchmarks (benchmark_id));
joinable!(results -> environments (environment_id));
joinable!(results -> executables (executable_id));
joinable!(results -> revisions (revision_id));
joinable!(revisions -> branches (branch_id));
joinable!(revisions -> projects (project_id));

allow_tables_to_appear_in_same_query!(
    benchmarks,
    branches,
    environments,
    executables,
    projects,
    reports,
    results,
    revisions,
    users,
);
