//! Translation properties over realistic WireGuard configs.

use netstack_vpn::translate;
use netstack_vpn::translate::DirectiveKey;

fn lines(doc: &str) -> Vec<String> {
    translate(doc).to_string().lines().map(str::to_string).collect()
}

#[test]
fn round_trip_example() {
    let doc = "[Interface]
PrivateKey = AAA
ListenPort = 51820
[Peer]
PublicKey = BBB
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = 1.2.3.4:51820
PersistentKeepalive = 25
";
    let expected = "private_key=AAA
listen_port=51820
replace_peers=true
public_key=BBB
allowed_ip=0.0.0.0/0
allowed_ip=::/0
endpoint=1.2.3.4:51820
persistent_keepalive_interval=25";

    let out = translate(doc).to_string();
    assert_eq!(out, expected);
    assert!(!out.ends_with('\n'));
}

#[test]
fn replace_peers_appears_once_before_first_public_key() {
    let docs = [
        "[Peer]\nPublicKey = a",
        "[Interface]\nPrivateKey = k\n[Peer]\nEndpoint = e:1\nPublicKey = a\n[Peer]\nPublicKey = b",
        "[Peer]\nAllowedIPs = 10.0.0.0/8\n[Peer]\nPublicKey = a\n[Interface]\nListenPort = 1\n[Peer]\nPublicKey = b",
        "[peer]\npublickey=a\n[PEER]\nPUBLICKEY=b\n[Peer]\nPublicKey=c\n[Peer]\nPublicKey=d",
    ];

    for doc in docs {
        let out = lines(doc);
        let replace: Vec<usize> = out
            .iter()
            .enumerate()
            .filter(|(_, l)| *l == "replace_peers=true")
            .map(|(i, _)| i)
            .collect();
        let first_key = out.iter().position(|l| l.starts_with("public_key=")).unwrap();

        assert_eq!(replace.len(), 1, "{}", doc);
        assert!(replace[0] < first_key, "{}", doc);
    }
}

#[test]
fn unknown_material_is_ignored_in_source_order() {
    let doc = "# generated by wg-quick
[Interface]
Address = 10.8.0.2/24, fd15:53b6:dead::2/64
DNS = 1.1.1.1
MTU = 1380
PrivateKey = priv=
Table = off
PostUp = iptables -A FORWARD -i %i -j ACCEPT

[Relay]
PublicKey = not-a-peer

[Peer]
PresharedKey = psk=
PublicKey = pub=
Endpoint = vpn.example.com:51820
AllowedIPs = 10.8.0.0/24
";

    assert_eq!(
        lines(doc),
        vec![
            "private_key=priv=",
            "replace_peers=true",
            "public_key=pub=",
            "endpoint=vpn.example.com:51820",
            "allowed_ip=10.8.0.0/24",
        ]
    );
}

#[test]
fn multi_peer_blocks_stay_contiguous() {
    let doc = "[Interface]
PrivateKey = srv
ListenPort = 51820

[Peer]
PublicKey = alice
AllowedIPs = 10.8.0.2/32

[Peer]
PublicKey = bob
AllowedIPs = 10.8.0.3/32, fd15:53b6:dead::3/128
PersistentKeepalive = 15
";

    assert_eq!(
        lines(doc),
        vec![
            "private_key=srv",
            "listen_port=51820",
            "replace_peers=true",
            "public_key=alice",
            "allowed_ip=10.8.0.2/32",
            "public_key=bob",
            "allowed_ip=10.8.0.3/32",
            "allowed_ip=fd15:53b6:dead::3/128",
            "persistent_keepalive_interval=15",
        ]
    );
}

#[test]
fn directive_keys_are_typed() {
    let list = translate("[Peer]\nPublicKey = a\nAllowedIPs = 10.0.0.1/32");
    let keys: Vec<DirectiveKey> = list.iter().map(|d| d.key).collect();

    assert_eq!(
        keys,
        vec![DirectiveKey::ReplacePeers, DirectiveKey::PublicKey, DirectiveKey::AllowedIp]
    );
    assert_eq!(list.len(), 3);
}

#[test]
fn garbage_never_panics() {
    let inputs = [
        "[",
        "]",
        "[]",
        "=",
        "==",
        "[Peer]\n=\nAllowedIPs =\nAllowedIPs = ,,,",
        "[Interface\nPrivateKey = x",
        "\u{feff}[Interface]\nPrivateKey = x",
        "[Peer]\nPublicKey",
    ];

    for input in inputs {
        let out = translate(input);
        assert!(out.iter().all(|d| !d.value.contains('\n')));
    }

    assert!(translate("[Peer]\n=\nAllowedIPs =\nAllowedIPs = ,,,").is_empty());
    assert!(translate("[Interface\nPrivateKey = x").is_empty());
}
