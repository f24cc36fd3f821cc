#[cfg(test)]
mod tests {
    use crate::{ClientBuilder, Error, FakeDynamicClient, ResourceInstance, WatchEventType};
    use futures::StreamExt;
    use json_patch::Patch as JsonPatch;
    use kube::api::{ListParams, Patch};
    use serde_json::{json, Value};

    fn client() -> FakeDynamicClient {
        FakeDynamicClient::new().unwrap()
    }

    fn pods(client: &FakeDynamicClient) -> ResourceInstance {
        client.resources().get("Pod", "v1").unwrap()
    }

    fn pod_body(name: &str) -> Value {
        json!({
            "metadata": {"name": name, "labels": {"app": "web"}},
            "spec": {"containers": [{"name": "c", "image": "nginx"}]}
        })
    }

    fn events_for(client: &FakeDynamicClient, name: &str) -> Vec<String> {
        client
            .resources()
            .get("Event", "v1")
            .unwrap()
            .list(None, &ListParams::default().fields(&format!("involvedObject.name={}", name)))
            .unwrap()
            .items()
            .iter()
            .map(|e| e.str_at("reason").unwrap().to_string())
            .collect()
    }

    // Scenario A
    #[test]
    fn test_create_pod_gets_running_status() {
        let client = client();
        let pod = pods(&client).create(&pod_body("p1"), Some("default")).unwrap();

        assert_eq!(pod.str_at("status.phase"), Some("Running"));
        assert_eq!(pod.str_at("status.containerStatuses.0.name"), Some("c"));
    }

    #[test]
    fn test_create_stamps_metadata() {
        let client = client();
        let pod = pods(&client).create(&pod_body("p1"), None).unwrap();

        assert_eq!(pod.api_version(), Some("v1"));
        assert_eq!(pod.kind(), Some("Pod"));
        assert_eq!(pod.namespace(), Some("default"));
        assert_eq!(pod.generation(), Some(1));
        assert_eq!(pod.uid().unwrap().len(), 36);
        assert!(pod.resource_version().unwrap().parse::<u64>().is_ok());
        assert!(pod.creation_timestamp().unwrap().ends_with('Z'));
        assert_eq!(pod.get("metadata.annotations"), Some(&json!({})));
        assert_eq!(pod.labels().get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_create_namespace_argument_wins_over_body() {
        let client = client();
        let mut body = pod_body("p1");
        body["metadata"]["namespace"] = json!("from-body");

        let pod = pods(&client).create(&body, Some("from-arg")).unwrap();
        assert_eq!(pod.namespace(), Some("from-arg"));

        let mut other = pod_body("p2");
        other["metadata"]["namespace"] = json!("from-body");
        let pod = pods(&client).create(&other, None).unwrap();
        assert_eq!(pod.namespace(), Some("from-body"));
    }

    #[test]
    fn test_create_cluster_scoped_drops_namespace() {
        let client = client();
        let nodes = client.resources().get("Node", "v1").unwrap();
        let node = nodes
            .create(&json!({"metadata": {"name": "n1", "namespace": "oops"}}), Some("default"))
            .unwrap();

        assert_eq!(node.namespace(), None);
        assert!(nodes.get("n1", None).is_ok());
        // The namespace argument is ignored for cluster-scoped kinds
        assert!(nodes.get("n1", Some("anything")).is_ok());
    }

    #[test]
    fn test_create_requires_name_and_object_body() {
        let client = client();
        let pods = pods(&client);

        let err = pods.create(&json!({"metadata": {}}), None).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(matches!(
            pods.create(&json!("not an object"), None),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            pods.create(&json!({"metadata": {"name": "x", "labels": "bad"}}), None),
            Err(Error::InvalidRequest(_))
        ));
        assert!(client.storage().list("Pod", "v1", None, None, None).unwrap().is_empty());
    }

    // Scenario B
    #[test]
    fn test_duplicate_create_conflicts() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), Some("default")).unwrap();

        let mut second = pod_body("p1");
        second["spec"]["containers"][0]["image"] = json!("redis");
        let err = pods.create(&second, Some("default")).unwrap_err();

        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert!(err.is_conflict());
        assert_eq!(err.status_code(), 409);

        let stored = pods.get("p1", Some("default")).unwrap();
        assert_eq!(stored.str_at("spec.containers.0.image"), Some("nginx"));
        assert_eq!(pods.list(None, &ListParams::default()).unwrap().items().len(), 1);
    }

    #[test]
    fn test_same_name_in_other_namespace_is_distinct() {
        let client = client();
        let pods = pods(&client);
        let a = pods.create(&pod_body("p1"), Some("a")).unwrap();
        let b = pods.create(&pod_body("p1"), Some("b")).unwrap();

        assert_ne!(a.uid(), b.uid());
        assert_eq!(pods.list(Some("a"), &ListParams::default()).unwrap().items().len(), 1);
        assert_eq!(pods.list(None, &ListParams::default()).unwrap().items().len(), 2);
    }

    // Scenario C
    #[test]
    fn test_patch_merges_and_bumps_versions() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), Some("default")).unwrap();

        let patched = pods
            .patch("p1", &json!({"metadata": {"labels": {"k": "v"}}}), Some("default"))
            .unwrap();

        assert_eq!(created.generation(), Some(1));
        assert_eq!(patched.generation(), Some(2));
        assert_ne!(patched.resource_version(), created.resource_version());
        assert_eq!(patched.uid(), created.uid());
        assert_eq!(patched.creation_timestamp(), created.creation_timestamp());
        assert_eq!(patched.get("spec"), created.get("spec"));
        assert_eq!(patched.labels().get("k").map(String::as_str), Some("v"));
        assert_eq!(patched.labels().get("app").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_patch_cannot_rename_or_touch_identity() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), None).unwrap();

        let err = pods
            .patch("p1", &json!({"metadata": {"name": "p2"}}), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let patched = pods
            .patch(
                "p1",
                &json!({"metadata": {"uid": "forged", "namespace": "elsewhere"}}),
                None,
            )
            .unwrap();
        assert_eq!(patched.uid(), created.uid());
        assert_eq!(patched.namespace(), Some("default"));
        assert!(pods.get("p1", Some("elsewhere")).is_err());
    }

    #[test]
    fn test_patch_missing_is_not_found() {
        let client = client();
        let err = pods(&client).patch("ghost", &json!({}), None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_patch_with_kube_patch_types() {
        let client = client();
        let deployments = client.resources().get("Deployment", "apps/v1").unwrap();
        deployments
            .create(
                &json!({
                    "metadata": {"name": "web", "labels": {"app": "web", "tier": "front"}},
                    "spec": {"replicas": 1, "paused": false}
                }),
                None,
            )
            .unwrap();

        let merged = deployments
            .patch_with(
                "web",
                &Patch::Merge(json!({"metadata": {"labels": {"tier": null}}, "spec": {"replicas": 3}})),
                None,
            )
            .unwrap();
        assert_eq!(merged.get("spec.replicas"), Some(&json!(3)));
        assert!(merged.labels().get("tier").is_none());

        let ops: JsonPatch = serde_json::from_value(json!([
            {"op": "replace", "path": "/spec/paused", "value": true},
            {"op": "add", "path": "/metadata/annotations/owner", "value": "team"}
        ]))
        .unwrap();
        let jsoned = deployments
            .patch_with("web", &Patch::<()>::Json(ops), None)
            .unwrap();
        assert_eq!(jsoned.get("spec.paused"), Some(&json!(true)));
        assert_eq!(jsoned.annotations().get("owner").map(String::as_str), Some("team"));
        assert_eq!(jsoned.generation(), Some(3));

        let bad: JsonPatch =
            serde_json::from_value(json!([{"op": "remove", "path": "/spec/missing"}])).unwrap();
        let err = deployments
            .patch_with("web", &Patch::<()>::Json(bad), None)
            .unwrap_err();
        assert!(matches!(err, Error::PatchError(_)));
        assert_eq!(deployments.get("web", None).unwrap().generation(), Some(3));

        let strategic = deployments
            .patch_with("web", &Patch::Strategic(json!({"spec": {"minReadySeconds": 5}})), None)
            .unwrap();
        assert_eq!(strategic.get("spec.replicas"), Some(&json!(3)));
        assert_eq!(strategic.get("spec.minReadySeconds"), Some(&json!(5)));
    }

    // Scenario D
    #[test]
    fn test_replace_with_stale_version_conflicts() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), None).unwrap();

        let mut body = pod_body("p1");
        body["metadata"]["resourceVersion"] = json!("stale");
        body["spec"]["containers"][0]["image"] = json!("redis");

        let err = pods.replace("p1", &body, None).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.is_conflict());

        assert_eq!(pods.get("p1", None).unwrap(), created);
    }

    #[test]
    fn test_replace_version_must_match_exactly() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), None).unwrap();
        let current = created.resource_version().unwrap().to_string();

        // Same number, different token
        for token in [format!("+{}", current), format!("0{}", current)] {
            let mut body = pod_body("p1");
            body["metadata"]["resourceVersion"] = json!(token);
            let err = pods.replace("p1", &body, None).unwrap_err();
            assert!(matches!(err, Error::Conflict(_)), "token {:?}", token);
        }

        assert_eq!(pods.get("p1", None).unwrap(), created);
    }

    #[test]
    fn test_replace_with_non_string_version_is_rejected() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), None).unwrap();
        let current: u64 = created.resource_version().unwrap().parse().unwrap();

        for version in [json!(999), json!(current), json!(true)] {
            let mut body = pod_body("p1");
            body["metadata"]["resourceVersion"] = version.clone();
            let err = pods.replace("p1", &body, None).unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)), "version {}", version);
        }

        // An explicit null means no precondition
        let mut body = pod_body("p1");
        body["metadata"]["resourceVersion"] = Value::Null;
        assert!(pods.replace("p1", &body, None).is_ok());
    }

    #[test]
    fn test_replace_with_current_version() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), None).unwrap();

        let mut body = json!({
            "metadata": {"name": "p1"},
            "spec": {"containers": [{"name": "c", "image": "redis"}]}
        });
        body["metadata"]["resourceVersion"] = json!(created.resource_version().unwrap());

        let replaced = pods.replace("p1", &body, None).unwrap();
        assert_eq!(replaced.str_at("spec.containers.0.image"), Some("redis"));
        assert_eq!(replaced.generation(), Some(2));
        assert_eq!(replaced.uid(), created.uid());
        // Labels were not part of the body
        assert!(replaced.labels().is_empty());
        // Status carried over from the stored object
        assert_eq!(replaced.str_at("status.phase"), Some("Running"));
    }

    #[test]
    fn test_replace_without_version_and_with_status() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();

        let replaced = pods
            .replace(
                "p1",
                &json!({"spec": {"containers": []}, "status": {"phase": "Succeeded"}}),
                None,
            )
            .unwrap();
        assert_eq!(replaced.name(), Some("p1"));
        assert_eq!(replaced.str_at("status.phase"), Some("Succeeded"));

        let err = pods
            .replace("p1", &json!({"metadata": {"name": "other"}}), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(pods.replace("ghost", &json!({}), None).unwrap_err().is_not_found());
    }

    // Scenario E
    #[test]
    fn test_delete_missing_is_not_found() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();

        let err = pods.delete("missing", None).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
        assert_eq!(pods.list(None, &ListParams::default()).unwrap().items().len(), 1);
    }

    #[test]
    fn test_delete_returns_object_and_recreate_gets_fresh_uid() {
        let client = client();
        let pods = pods(&client);
        let created = pods.create(&pod_body("p1"), None).unwrap();

        let deleted = pods.delete("p1", None).unwrap();
        assert_eq!(deleted, created);
        assert!(pods.get("p1", None).unwrap_err().is_not_found());
        assert!(pods.delete("p1", None).unwrap_err().is_not_found());

        let recreated = pods.create(&pod_body("p1"), None).unwrap();
        assert_ne!(recreated.uid(), created.uid());
    }

    #[test]
    fn test_not_found_symmetry() {
        let client = client();
        let pods = pods(&client);
        assert!(pods.get("p1", None).unwrap_err().is_not_found());
        assert!(pods.delete("p1", None).unwrap_err().is_not_found());
        assert!(pods.patch("p1", &json!({}), None).unwrap_err().is_not_found());
        assert!(pods.replace("p1", &json!({}), None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_collection_not_allowed() {
        let client = client();
        let err = pods(&client)
            .delete_collection(None, &ListParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed { .. }));
        assert_eq!(err.status_code(), 405);
    }

    #[test]
    fn test_resource_versions_strictly_increase() {
        let client = client();
        let pods = pods(&client);
        let mut last = 0u64;

        let created = pods.create(&pod_body("p1"), None).unwrap();
        let mut versions = vec![created.resource_version().unwrap().parse::<u64>().unwrap()];
        for i in 0..3 {
            let patched = pods
                .patch("p1", &json!({"metadata": {"labels": {"round": i.to_string()}}}), None)
                .unwrap();
            versions.push(patched.resource_version().unwrap().parse().unwrap());
        }

        for version in versions {
            assert!(version > last);
            last = version;
        }
        assert_eq!(pods.get("p1", None).unwrap().generation(), Some(4));
    }

    #[test]
    fn test_reads_are_isolated_copies() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();

        let first = pods.get("p1", None).unwrap();
        let mut mutated = first.clone().into_value();
        mutated["spec"] = json!({"hacked": true});

        let second = pods.get("p1", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.str_at("spec.containers.0.image"), Some("nginx"));
    }

    #[test]
    fn test_list_shape_and_selectors() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("web-1"), Some("a")).unwrap();
        pods.create(&pod_body("web-2"), Some("b")).unwrap();
        let mut db = pod_body("db-1");
        db["metadata"]["labels"] = json!({"app": "db"});
        pods.create(&db, Some("a")).unwrap();

        let list = pods.list(None, &ListParams::default()).unwrap();
        assert_eq!(list.kind(), Some("PodList"));
        assert_eq!(list.api_version(), Some("v1"));
        assert!(list.resource_version().is_some());
        assert_eq!(list.items().len(), 3);

        let web = pods.list(None, &ListParams::default().labels("app=web")).unwrap();
        assert_eq!(web.items().len(), 2);

        let web_in_a = pods
            .list(Some("a"), &ListParams::default().labels("app==web"))
            .unwrap();
        assert_eq!(web_in_a.items()[0].name(), Some("web-1"));

        let not_web = pods
            .list(None, &ListParams::default().labels("app!=web"))
            .unwrap();
        assert_eq!(not_web.items()[0].name(), Some("db-1"));

        let by_field = pods
            .list(None, &ListParams::default().fields("metadata.name=web-2"))
            .unwrap();
        assert_eq!(by_field.items()[0].namespace(), Some("b"));

        let limited = pods.list(None, &ListParams::default().limit(1)).unwrap();
        assert_eq!(limited.items().len(), 1);

        assert!(matches!(
            pods.list(None, &ListParams::default().labels("app in (web")),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_watch_enumerates_current_state() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();
        pods.create(&pod_body("p2"), Some("other")).unwrap();

        let events: Vec<_> = pods.watch(None, &ListParams::default()).unwrap().collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == WatchEventType::Added));
        assert_eq!(
            serde_json::to_value(&events[0]).unwrap()["type"],
            json!("ADDED")
        );

        pods.delete("p1", None).unwrap();
        let again: Vec<_> = pods
            .watch(Some("other"), &ListParams::default())
            .unwrap()
            .map(|e| e.object.name().unwrap().to_string())
            .collect();
        assert_eq!(again, vec!["p2"]);
    }

    #[tokio::test]
    async fn test_watch_stream() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();

        let events: Vec<_> = pods
            .watch_stream(None, &ListParams::default().labels("app=web"))
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object.name(), Some("p1"));
    }

    #[test]
    fn test_events_recorded_for_lifecycle() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();
        pods.patch("p1", &json!({"metadata": {"labels": {"x": "y"}}}), None)
            .unwrap();
        pods.delete("p1", None).unwrap();

        let mut reasons = events_for(&client, "p1");
        reasons.sort();
        assert_eq!(reasons, vec!["Created", "Deleted", "Updated"]);
    }

    #[test]
    fn test_failed_mutation_records_no_event() {
        let client = client();
        let pods = pods(&client);
        pods.create(&pod_body("p1"), None).unwrap();
        let _ = pods.create(&pod_body("p1"), None);
        let _ = pods.delete("missing", None);

        assert_eq!(events_for(&client, "p1"), vec!["Created"]);
        assert!(events_for(&client, "missing").is_empty());
    }

    #[test]
    fn test_events_can_be_disabled() {
        let client = ClientBuilder::new().without_events().build().unwrap();
        pods(&client).create(&pod_body("p1"), None).unwrap();
        assert!(client.storage().list("Event", "v1", None, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_ephemeral_project_request_creates_project() {
        let client = client();
        let requests = client
            .resources()
            .get("ProjectRequest", "project.openshift.io/v1")
            .unwrap();

        let project = requests
            .create(&json!({"metadata": {"name": "team-a"}}), None)
            .unwrap();
        assert_eq!(project.kind(), Some("Project"));
        assert_eq!(project.api_version(), Some("project.openshift.io/v1"));
        assert_eq!(project.namespace(), None);

        let projects = client
            .resources()
            .get("Project", "project.openshift.io/v1")
            .unwrap();
        assert!(projects.get("team-a", None).is_ok());
        assert!(requests.get("team-a", None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ephemeral_redirect_is_scoped_to_group() {
        let client = ClientBuilder::new()
            .with_fallback_group_scope("example.com", true)
            .build()
            .unwrap();
        let requests = client
            .resources()
            .get("ProjectRequest", "example.com/v1")
            .unwrap();

        let request = requests
            .create(&json!({"metadata": {"name": "r1"}}), None)
            .unwrap();
        assert_eq!(request.kind(), Some("ProjectRequest"));
        assert_eq!(request.api_version(), Some("example.com/v1"));
        assert!(requests.get("r1", None).is_ok());
        assert!(client
            .resources()
            .get("Project", "project.openshift.io/v1")
            .unwrap()
            .get("r1", None)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_custom_ephemeral_kind() {
        let client = ClientBuilder::new()
            .without_ephemeral_kinds()
            .with_ephemeral_kind("example.com", "NamespaceRequest", "Namespace", "v1")
            .with_fallback_kind_scope("NamespaceRequest", false)
            .build()
            .unwrap();

        let ns = client
            .resources()
            .get("NamespaceRequest", "example.com/v1")
            .unwrap()
            .create(&json!({"metadata": {"name": "sandbox"}}), None)
            .unwrap();
        assert_eq!(ns.kind(), Some("Namespace"));
        assert_eq!(ns.str_at("status.phase"), Some("Active"));

        // ProjectRequest is an ordinary kind once the defaults are dropped
        let request = client
            .resources()
            .get("ProjectRequest", "project.openshift.io/v1")
            .unwrap()
            .create(&json!({"metadata": {"name": "p"}}), None)
            .unwrap();
        assert_eq!(request.kind(), Some("ProjectRequest"));
    }

    #[test]
    fn test_status_from_schema_and_overlay() {
        let client = client();
        let pvcs = client
            .resources()
            .get("PersistentVolumeClaim", "v1")
            .unwrap();

        let claim = pvcs
            .create(
                &json!({
                    "metadata": {"name": "data"},
                    "spec": {
                        "accessModes": ["ReadWriteOnce"],
                        "resources": {"requests": {"storage": "10Gi"}}
                    }
                }),
                None,
            )
            .unwrap();
        assert_eq!(claim.str_at("status.phase"), Some("Bound"));
        assert_eq!(claim.str_at("status.capacity.storage"), Some("10Gi"));

        let configmaps = client.resources().get("ConfigMap", "v1").unwrap();
        let cm = configmaps
            .create(
                &json!({"metadata": {"name": "cm"}, "status": {"note": "mine"}}),
                None,
            )
            .unwrap();
        assert_eq!(cm.str_at("status.conditions.0.type"), Some("Ready"));
        assert_eq!(cm.str_at("status.note"), Some("mine"));
    }

    #[test]
    fn test_created_crd_becomes_resolvable() {
        let client = client();
        let crds = client
            .resources()
            .get("CustomResourceDefinition", "apiextensions.k8s.io/v1")
            .unwrap();

        crds.create(
            &json!({
                "metadata": {"name": "gizmos.example.com"},
                "spec": {
                    "group": "example.com",
                    "names": {"kind": "Gizmo", "plural": "gizmos", "singular": "gizmo"},
                    "scope": "Cluster",
                    "versions": [{"name": "v1", "served": true, "storage": true}]
                }
            }),
            None,
        )
        .unwrap();

        let gizmos = client.resources().get("Gizmo", "example.com/v1").unwrap();
        assert!(!gizmos.namespaced());
        assert_eq!(gizmos.plural(), "gizmos");
    }

    #[test]
    fn test_accessors() {
        let client = client();
        let deployments = client.resources().get("Deployment", "apps/v1").unwrap();

        assert_eq!(deployments.kind(), "Deployment");
        assert_eq!(deployments.api_version(), "apps/v1");
        assert_eq!(deployments.group(), "apps");
        assert_eq!(deployments.version(), "v1");
        assert_eq!(deployments.plural(), "deployments");
        assert_eq!(deployments.singular(), "deployment");
        assert!(deployments.namespaced());
        assert!(deployments.short_names().contains(&"deploy".to_string()));
        assert_eq!(deployments.definition().group_version(), "apps/v1");
    }
}
